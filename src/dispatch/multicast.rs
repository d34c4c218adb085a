//! Parallel multicast dispatch
//!
//! Sends a copy of one message to every destination of a group, running the
//! branches concurrently on the group's worker pool, and waits for all of
//! them. Outcomes come back in group order no matter which branch finished
//! first.

use super::pool::WorkerPool;
use crate::error::{ConfigurationError, DispatchError, HandlerError};
use crate::message::{DestinationId, Message};
use crate::routing::Predicate;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct MulticastGroup {
    name: String,
    destinations: Vec<DestinationId>,
    pool: Arc<WorkerPool>,
    filter: Option<Predicate>,
}

impl MulticastGroup {
    pub fn new(
        name: impl Into<String>,
        destinations: Vec<DestinationId>,
        pool: Arc<WorkerPool>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if destinations.is_empty() {
            return Err(ConfigurationError::EmptyMulticastGroup { group: name });
        }

        Ok(Self {
            name,
            destinations,
            pool,
            filter: None,
        })
    }

    /// Only messages accepted by `filter` are dispatched
    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn accepts(&self, message: &Message) -> bool {
        self.filter.as_ref().is_none_or(|f| f.test(message))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn destinations(&self) -> &[DestinationId] {
        &self.destinations
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }
}

/// Result of one multicast branch
#[derive(Debug)]
pub struct Outcome {
    pub destination: DestinationId,
    pub result: Result<(), HandlerError>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct ParallelMulticastDispatcher {
    transport: Arc<dyn Transport>,
}

impl ParallelMulticastDispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Deliver `message` to every destination of `group` and wait for all branches.
    ///
    /// Branch failures are reported in the returned outcomes and never stop
    /// sibling branches. The call itself fails only if the pool is shut down
    /// before every branch could start; branches that already started keep
    /// running. Dropping the returned future has the same effect.
    pub async fn dispatch(
        &self,
        message: &Message,
        group: &MulticastGroup,
    ) -> Result<Vec<Outcome>, DispatchError> {
        let started = Instant::now();
        let mut branches: Vec<(DestinationId, JoinHandle<_>)> =
            Vec::with_capacity(group.destinations.len());

        for destination in &group.destinations {
            let permit = group.pool.acquire().await?;
            let transport = Arc::clone(&self.transport);
            let target = destination.clone();
            let copy = message.clone();

            debug!(group = %group.name, destination = %destination, "Starting multicast branch");
            let handle = group
                .pool
                .spawn(permit, async move { transport.send(&target, copy).await });
            branches.push((destination.clone(), handle));
        }

        let mut outcomes = Vec::with_capacity(branches.len());
        for (destination, handle) in branches {
            let result = match handle.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(HandlerError::Delivery(e)),
                Err(e) if e.is_panic() => Err(HandlerError::Panicked {
                    destination: destination.clone(),
                }),
                Err(_) => Err(HandlerError::Aborted {
                    destination: destination.clone(),
                }),
            };

            if let Err(e) = &result {
                warn!(group = %group.name, destination = %destination, error = %e, "Multicast branch failed");
            }
            outcomes.push(Outcome {
                destination,
                result,
            });
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            group = %group.name,
            branches = outcomes.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Multicast dispatch complete"
        );
        Ok(outcomes)
    }
}
