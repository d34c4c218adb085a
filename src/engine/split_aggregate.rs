//! Split, process each part concurrently, aggregate
//!
//! Parts are processed on the worker pool and may finish in any order; the
//! aggregator restores split order before folding.

use crate::aggregate::Aggregator;
use crate::dispatch::WorkerPool;
use crate::error::{AggregationError, AggregationTimeoutError, EngineError, HandlerError, Result};
use crate::message::{Message, MESSAGE_ID};
use crate::split::{correlation_id_for, Splitter};
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct SplitAggregate {
    splitter: Arc<dyn Splitter>,
    aggregator: Arc<Aggregator>,
    pool: Arc<WorkerPool>,
}

impl SplitAggregate {
    pub fn new(
        splitter: Arc<dyn Splitter>,
        aggregator: Arc<Aggregator>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            splitter,
            aggregator,
            pool,
        }
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// Split `message`, run `processor` on every part and return the aggregate.
    ///
    /// A message without an id is given a fresh one so that identical bodies
    /// sent separately do not share a correlation id. The whole run is bounded
    /// by the aggregator's timeout, counted from the split. On any failure,
    /// including that timeout, the aggregation is discarded and the error is
    /// returned. Part processors that are still running are not cancelled.
    pub async fn run<P, Fut>(&self, message: Message, processor: P) -> Result<Message>
    where
        P: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Message, HandlerError>> + Send + 'static,
    {
        let message = match message.message_id() {
            Some(_) => message,
            None => message.with_header(MESSAGE_ID, Uuid::new_v4().to_string()),
        };
        let correlation_id = correlation_id_for(&message);

        let parts = self.splitter.split(&message);
        if parts.is_empty() {
            return Err(EngineError::EmptySplit { correlation_id });
        }
        let total_parts = parts.len();
        debug!(correlation_id = %correlation_id, parts = total_parts, "Split message");

        let started = Instant::now();
        let mut offered = 0;
        let gathered = tokio::time::timeout_at(
            started + self.aggregator.timeout(),
            self.process_parts(&correlation_id, parts, processor, &mut offered),
        )
        .await;

        let result = match gathered {
            Ok(result) => result,
            Err(_) => {
                let timeout = AggregationTimeoutError {
                    correlation_id: correlation_id.clone(),
                    parts_received: offered,
                    total_parts: Some(total_parts),
                    waited: started.elapsed(),
                };
                warn!(
                    correlation_id = %correlation_id,
                    parts_received = offered,
                    total_parts,
                    "Split/aggregate timed out"
                );
                Err(AggregationError::Timeout(timeout).into())
            }
        };

        if result.is_err() {
            self.aggregator.discard(&correlation_id).await;
        }
        result
    }

    /// Submit every part to the pool and offer results as they finish
    async fn process_parts<P, Fut>(
        &self,
        correlation_id: &str,
        parts: Vec<Message>,
        processor: P,
        offered: &mut usize,
    ) -> Result<Message>
    where
        P: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Message, HandlerError>> + Send + 'static,
    {
        let processor = Arc::new(processor);
        let mut running = FuturesUnordered::new();
        for part in parts {
            let processor = Arc::clone(&processor);
            let handle = self
                .pool
                .submit(async move {
                    let result = processor(part.clone()).await;
                    result.map(|processed| processed.with_split_headers_of(&part))
                })
                .await?;
            running.push(handle);
        }

        while let Some(joined) = running.next().await {
            let processed = joined.map_err(|e| HandlerError::Failed {
                reason: format!("part processor for {correlation_id} did not finish: {e}"),
            })??;

            *offered += 1;
            if let Some(aggregate) = self.aggregator.offer(processed).await? {
                info!(correlation_id = %correlation_id, "Split/aggregate complete");
                return Ok(aggregate);
            }
        }

        Err(EngineError::Incomplete {
            correlation_id: correlation_id.to_string(),
        })
    }
}
