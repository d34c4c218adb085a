//! In-memory transport that records deliveries per destination

use super::Transport;
use crate::error::DeliveryError;
use crate::message::{DestinationId, Message};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::trace;

/// How the transport treats sends to one destination
#[derive(Debug, Clone, Default)]
pub enum DeliveryBehavior {
    #[default]
    Deliver,
    /// Wait before recording the delivery
    Delay(Duration),
    /// Reject every send
    Fail(String),
    /// Reject the next `n` sends, then deliver
    FailTimes(u32),
}

#[derive(Default)]
pub struct InMemoryTransport {
    deliveries: Mutex<HashMap<DestinationId, Vec<Message>>>,
    behaviors: Mutex<HashMap<DestinationId, DeliveryBehavior>>,
    attempts: Mutex<HashMap<DestinationId, usize>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_behavior(&self, destination: impl Into<DestinationId>, behavior: DeliveryBehavior) {
        let mut behaviors = self.behaviors.lock().await;
        behaviors.insert(destination.into(), behavior);
    }

    /// Messages delivered to a destination, in delivery order
    pub async fn delivered(&self, destination: &str) -> Vec<Message> {
        let deliveries = self.deliveries.lock().await;
        deliveries
            .get(&DestinationId::from(destination))
            .cloned()
            .unwrap_or_default()
    }

    /// Remove and return the messages delivered to a destination
    pub async fn drain(&self, destination: &str) -> Vec<Message> {
        let mut deliveries = self.deliveries.lock().await;
        deliveries
            .remove(&DestinationId::from(destination))
            .unwrap_or_default()
    }

    /// Number of send attempts, successful or not
    pub async fn attempts(&self, destination: &str) -> usize {
        let attempts = self.attempts.lock().await;
        attempts
            .get(&DestinationId::from(destination))
            .copied()
            .unwrap_or(0)
    }

    async fn next_behavior(&self, destination: &DestinationId) -> DeliveryBehavior {
        let mut behaviors = self.behaviors.lock().await;
        match behaviors.get_mut(destination) {
            Some(DeliveryBehavior::FailTimes(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                DeliveryBehavior::Fail("transient failure".to_string())
            }
            Some(DeliveryBehavior::FailTimes(_)) | None => DeliveryBehavior::Deliver,
            Some(behavior) => behavior.clone(),
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(
        &self,
        destination: &DestinationId,
        message: Message,
    ) -> Result<(), DeliveryError> {
        {
            let mut attempts = self.attempts.lock().await;
            *attempts.entry(destination.clone()).or_default() += 1;
        }

        match self.next_behavior(destination).await {
            DeliveryBehavior::Fail(reason) => {
                return Err(DeliveryError::new(destination.clone(), reason));
            }
            DeliveryBehavior::Delay(delay) => tokio::time::sleep(delay).await,
            DeliveryBehavior::Deliver | DeliveryBehavior::FailTimes(_) => {}
        }

        trace!(destination = %destination, "Recorded delivery");
        let mut deliveries = self.deliveries.lock().await;
        deliveries
            .entry(destination.clone())
            .or_default()
            .push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_deliveries_in_order() {
        let transport = InMemoryTransport::new();
        let dest = DestinationId::from("xmlOrders");
        transport.send(&dest, Message::from("1")).await.unwrap();
        transport.send(&dest, Message::from("2")).await.unwrap();

        let bodies: Vec<_> = transport
            .delivered("xmlOrders")
            .await
            .iter()
            .map(|m| m.body_lossy().into_owned())
            .collect();
        assert_eq!(bodies, vec!["1", "2"]);
        assert!(transport.delivered("other").await.is_empty());
    }

    #[tokio::test]
    async fn test_fail_times_recovers() {
        let transport = InMemoryTransport::new();
        transport
            .set_behavior("orderAudit", DeliveryBehavior::FailTimes(2))
            .await;
        let dest = DestinationId::from("orderAudit");

        assert!(transport.send(&dest, Message::from("a")).await.is_err());
        assert!(transport.send(&dest, Message::from("a")).await.is_err());
        assert!(transport.send(&dest, Message::from("a")).await.is_ok());
        assert_eq!(transport.attempts("orderAudit").await, 3);
        assert_eq!(transport.drain("orderAudit").await.len(), 1);
        assert!(transport.delivered("orderAudit").await.is_empty());
    }
}
