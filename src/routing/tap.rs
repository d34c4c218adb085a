//! Wire tap: best-effort duplication to an observation channel
//!
//! The copy is sent on a detached task so the primary path never waits on
//! it. Failed or slow secondary deliveries are logged and dropped.

use crate::message::{DestinationId, Message};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Delivery policy for the secondary copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapPolicy {
    /// Total send attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Upper bound for a single send attempt
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Pause between attempts
    #[serde(default, with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for TapPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            timeout: default_timeout(),
            retry_delay: Duration::ZERO,
        }
    }
}

fn default_max_attempts() -> u32 {
    1
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

pub struct WireTap {
    secondary: DestinationId,
    transport: Arc<dyn Transport>,
    policy: TapPolicy,
}

impl WireTap {
    pub fn new(
        secondary: impl Into<DestinationId>,
        transport: Arc<dyn Transport>,
        policy: TapPolicy,
    ) -> Self {
        Self {
            secondary: secondary.into(),
            transport,
            policy,
        }
    }

    pub fn secondary(&self) -> &DestinationId {
        &self.secondary
    }

    pub fn policy(&self) -> &TapPolicy {
        &self.policy
    }

    /// Send a copy to the secondary destination, then run `primary` with the original.
    pub async fn tap<F, Fut, T>(&self, message: Message, primary: F) -> T
    where
        F: FnOnce(Message) -> Fut,
        Fut: Future<Output = T>,
    {
        self.send_copy(&message);
        primary(message).await
    }

    /// Spawn the secondary delivery and return immediately.
    ///
    /// The handle resolves to whether the copy was delivered. Dropping it does
    /// not cancel the delivery. Must be called from within a Tokio runtime.
    pub fn send_copy(&self, message: &Message) -> JoinHandle<bool> {
        let copy = message.clone();
        let transport = Arc::clone(&self.transport);
        let secondary = self.secondary.clone();
        let policy = self.policy.clone();

        tokio::spawn(async move { deliver_with_policy(transport, secondary, copy, policy).await })
    }
}

async fn deliver_with_policy(
    transport: Arc<dyn Transport>,
    secondary: DestinationId,
    message: Message,
    policy: TapPolicy,
) -> bool {
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match tokio::time::timeout(policy.timeout, transport.send(&secondary, message.clone())).await
        {
            Ok(Ok(())) => {
                debug!(destination = %secondary, attempt, "Wire tap copy delivered");
                return true;
            }
            Ok(Err(e)) => {
                warn!(destination = %secondary, attempt, max_attempts, error = %e, "Wire tap delivery failed");
            }
            Err(_) => {
                warn!(
                    destination = %secondary,
                    attempt,
                    max_attempts,
                    timeout = ?policy.timeout,
                    "Wire tap delivery timed out"
                );
            }
        }

        if attempt < max_attempts && !policy.retry_delay.is_zero() {
            tokio::time::sleep(policy.retry_delay).await;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{DeliveryBehavior, InMemoryTransport};
    use std::time::Instant;

    #[tokio::test]
    async fn test_copy_is_unaltered_and_primary_gets_original() {
        let transport = Arc::new(InMemoryTransport::new());
        let tap = WireTap::new("orderAudit", transport.clone(), TapPolicy::default());
        let message = Message::new("<order/>").with_header("CamelFileName", "a.xml");

        let seen = tap.tap(message.clone(), |m| async move { m }).await;
        assert_eq!(seen, message);

        tap.send_copy(&message).await.unwrap();
        let audited = transport.delivered("orderAudit").await;
        assert!(audited.iter().all(|m| *m == message));
        assert!(!audited.is_empty());
    }

    #[tokio::test]
    async fn test_slow_secondary_does_not_delay_primary() {
        let transport = Arc::new(InMemoryTransport::new());
        transport
            .set_behavior("orderAudit", DeliveryBehavior::Delay(Duration::from_secs(30)))
            .await;
        let tap = WireTap::new("orderAudit", transport, TapPolicy::default());

        let started = Instant::now();
        let result = tap.tap(Message::from("x"), |_| async { 42 }).await;

        assert_eq!(result, 42);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_retries_up_to_max_attempts() {
        let transport = Arc::new(InMemoryTransport::new());
        transport
            .set_behavior("orderAudit", DeliveryBehavior::FailTimes(2))
            .await;
        let policy = TapPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1),
            ..TapPolicy::default()
        };
        let tap = WireTap::new("orderAudit", transport.clone(), policy);

        assert!(tap.send_copy(&Message::from("x")).await.unwrap());
        assert_eq!(transport.attempts("orderAudit").await, 3);
    }

    #[tokio::test]
    async fn test_default_policy_does_not_retry() {
        let transport = Arc::new(InMemoryTransport::new());
        transport
            .set_behavior("orderAudit", DeliveryBehavior::Fail("broker down".into()))
            .await;
        let tap = WireTap::new("orderAudit", transport.clone(), TapPolicy::default());

        assert!(!tap.send_copy(&Message::from("x")).await.unwrap());
        assert_eq!(transport.attempts("orderAudit").await, 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failed_attempt() {
        let transport = Arc::new(InMemoryTransport::new());
        transport
            .set_behavior("orderAudit", DeliveryBehavior::Delay(Duration::from_secs(30)))
            .await;
        let policy = TapPolicy {
            timeout: Duration::from_millis(20),
            ..TapPolicy::default()
        };
        let tap = WireTap::new("orderAudit", transport.clone(), policy);

        assert!(!tap.send_copy(&Message::from("x")).await.unwrap());
        assert!(transport.delivered("orderAudit").await.is_empty());
    }
}
