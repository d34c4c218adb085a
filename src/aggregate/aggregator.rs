//! Correlating aggregator
//!
//! Each correlation id moves through Open -> Accumulating -> Complete, or
//! ends in Expired when its window runs out. Parts are folded strictly in
//! split index order; parts that arrive early wait in a buffer until their
//! predecessor has been folded.
//!
//! Locking: the context map is locked only to look up, insert or remove
//! entries. Each context has its own async mutex, so parts of one
//! correlation id are folded one at a time while other ids proceed freely.
//! The map lock is never held while waiting on a context lock.

use super::completion::CompletionPolicy;
use super::strategy::AggregationStrategy;
use crate::error::{AggregationError, AggregationTimeoutError};
use crate::message::{Message, SPLIT_INDEX, SPLIT_SIZE};
use lru::LruCache;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Number of finished correlation ids remembered to reject late parts
const DEFAULT_CLOSED_CAPACITY: usize = 1024;

#[derive(Debug)]
struct SplitContext {
    correlation_id: String,
    total_parts: Option<usize>,
    /// Parts accepted so far, folded or buffered
    parts_received: usize,
    /// Parts already folded into the accumulator
    folded: usize,
    next_index: usize,
    accumulator: Option<Message>,
    pending: BTreeMap<usize, Message>,
    closed: bool,
}

impl SplitContext {
    fn new(correlation_id: String, total_parts: Option<usize>) -> Self {
        Self {
            correlation_id,
            total_parts,
            parts_received: 0,
            folded: 0,
            next_index: 1,
            accumulator: None,
            pending: BTreeMap::new(),
            closed: false,
        }
    }

    fn accept(&mut self, index: usize, part: Message) -> Result<(), AggregationError> {
        if let Some(total) = self.total_parts {
            if index > total {
                return Err(AggregationError::InvalidPart {
                    reason: format!(
                        "index {index} exceeds {total} parts for {}",
                        self.correlation_id
                    ),
                });
            }
        }

        if index < self.next_index || self.pending.contains_key(&index) {
            return Err(AggregationError::DuplicatePart {
                correlation_id: self.correlation_id.clone(),
                index,
            });
        }

        self.pending.insert(index, part);
        self.parts_received += 1;
        Ok(())
    }

    /// Fold every buffered part that is next in line
    fn fold_ready(&mut self, strategy: &AggregationStrategy) {
        while let Some(part) = self.pending.remove(&self.next_index) {
            self.accumulator = Some(strategy.aggregate(self.accumulator.take(), part));
            self.folded += 1;
            self.next_index += 1;
        }
    }

    fn timeout_error(&self, waited: Duration) -> AggregationTimeoutError {
        AggregationTimeoutError {
            correlation_id: self.correlation_id.clone(),
            parts_received: self.parts_received,
            total_parts: self.total_parts,
            waited,
        }
    }
}

struct ContextSlot {
    opened_at: Instant,
    deadline: Instant,
    state: Mutex<SplitContext>,
}

pub struct Aggregator {
    strategy: AggregationStrategy,
    completion: CompletionPolicy,
    timeout: Duration,
    contexts: Mutex<HashMap<String, Arc<ContextSlot>>>,
    closed: Mutex<LruCache<String, ()>>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("strategy", &self.strategy)
            .field("completion", &self.completion)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Aggregator {
    pub fn new(strategy: AggregationStrategy, completion: CompletionPolicy, timeout: Duration) -> Self {
        Self::with_closed_capacity(strategy, completion, timeout, DEFAULT_CLOSED_CAPACITY)
    }

    /// Like [`Aggregator::new`], remembering up to `capacity` finished correlation ids
    pub fn with_closed_capacity(
        strategy: AggregationStrategy,
        completion: CompletionPolicy,
        timeout: Duration,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            strategy,
            completion,
            timeout,
            contexts: Mutex::new(HashMap::new()),
            closed: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Offer one split part.
    ///
    /// Returns the aggregate once the correlation id completes, `None` while
    /// it is still accumulating.
    pub async fn offer(&self, part: Message) -> Result<Option<Message>, AggregationError> {
        let correlation_id = part
            .correlation_id()
            .ok_or_else(|| AggregationError::InvalidPart {
                reason: "missing correlation id".to_string(),
            })?
            .to_string();
        let index = match part.split_index() {
            Some(index) if index > 0 => index,
            _ => {
                return Err(AggregationError::InvalidPart {
                    reason: format!("missing or invalid split index for {correlation_id}"),
                })
            }
        };

        let slot = self.slot_for(&correlation_id, &part).await?;
        let mut ctx = slot.state.lock().await;
        if ctx.closed {
            return Err(AggregationError::Closed { correlation_id });
        }

        let now = Instant::now();
        if now >= slot.deadline {
            let error = ctx.timeout_error(now - slot.opened_at);
            ctx.closed = true;
            drop(ctx);
            self.retire(&correlation_id, &slot).await;
            warn!(correlation_id = %correlation_id, parts_received = error.parts_received, "Aggregation expired");
            return Err(error.into());
        }

        ctx.accept(index, part)?;
        ctx.fold_ready(&self.strategy);
        debug!(
            correlation_id = %correlation_id,
            index,
            folded = ctx.folded,
            buffered = ctx.pending.len(),
            "Accepted split part"
        );

        let complete = match &ctx.accumulator {
            Some(acc) => self.completion.is_complete(acc, ctx.folded, ctx.total_parts),
            None => false,
        };
        if !complete {
            return Ok(None);
        }

        ctx.closed = true;
        let aggregate = ctx
            .accumulator
            .take()
            .map(|m| m.without_header(SPLIT_INDEX).without_header(SPLIT_SIZE));
        let folded = ctx.folded;
        drop(ctx);
        self.retire(&correlation_id, &slot).await;

        info!(correlation_id = %correlation_id, parts = folded, "Aggregation complete");
        Ok(aggregate)
    }

    /// Discard a correlation id without emitting anything
    pub async fn discard(&self, correlation_id: &str) -> bool {
        let slot = {
            let contexts = self.contexts.lock().await;
            contexts.get(correlation_id).cloned()
        };
        let Some(slot) = slot else {
            return false;
        };

        let mut ctx = slot.state.lock().await;
        if ctx.closed {
            return false;
        }
        ctx.closed = true;
        drop(ctx);
        self.retire(correlation_id, &slot).await;
        debug!(correlation_id, "Discarded aggregation");
        true
    }

    /// Expire every context whose window has elapsed
    pub async fn expire_stale(&self) -> Vec<AggregationTimeoutError> {
        let now = Instant::now();
        let expired: Vec<(String, Arc<ContextSlot>)> = {
            let contexts = self.contexts.lock().await;
            contexts
                .iter()
                .filter(|(_, slot)| slot.deadline <= now)
                .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
                .collect()
        };

        let mut errors = Vec::new();
        for (correlation_id, slot) in expired {
            let mut ctx = slot.state.lock().await;
            if ctx.closed {
                continue;
            }
            ctx.closed = true;
            let error = ctx.timeout_error(now - slot.opened_at);
            drop(ctx);
            self.retire(&correlation_id, &slot).await;

            warn!(
                correlation_id = %correlation_id,
                parts_received = error.parts_received,
                total_parts = ?error.total_parts,
                "Aggregation expired"
            );
            errors.push(error);
        }
        errors
    }

    /// Number of correlation ids still open
    pub async fn open_contexts(&self) -> usize {
        self.contexts.lock().await.len()
    }

    /// Periodically expire stale contexts, publishing each expiry on the returned channel.
    ///
    /// The task stops when the aggregator is dropped or the receiver is closed.
    pub fn spawn_reaper(
        self: &Arc<Self>,
        interval: Duration,
    ) -> (JoinHandle<()>, mpsc::UnboundedReceiver<AggregationTimeoutError>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let aggregator: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(aggregator) = aggregator.upgrade() else {
                    break;
                };
                for error in aggregator.expire_stale().await {
                    if tx.send(error).is_err() {
                        return;
                    }
                }
                if tx.is_closed() {
                    return;
                }
            }
        });

        (handle, rx)
    }

    async fn slot_for(
        &self,
        correlation_id: &str,
        first_part: &Message,
    ) -> Result<Arc<ContextSlot>, AggregationError> {
        let mut contexts = self.contexts.lock().await;
        if let Some(slot) = contexts.get(correlation_id) {
            return Ok(Arc::clone(slot));
        }

        if self.closed.lock().await.contains(correlation_id) {
            return Err(AggregationError::Closed {
                correlation_id: correlation_id.to_string(),
            });
        }

        let total_parts = self.completion.expected_parts(first_part);
        let opened_at = Instant::now();
        let slot = Arc::new(ContextSlot {
            opened_at,
            deadline: opened_at + self.timeout,
            state: Mutex::new(SplitContext::new(correlation_id.to_string(), total_parts)),
        });
        contexts.insert(correlation_id.to_string(), Arc::clone(&slot));

        debug!(correlation_id, total_parts = ?total_parts, "Opened aggregation");
        Ok(slot)
    }

    /// Remove a finished context and remember its id
    async fn retire(&self, correlation_id: &str, slot: &Arc<ContextSlot>) {
        let mut contexts = self.contexts.lock().await;
        if contexts
            .get(correlation_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            contexts.remove(correlation_id);
        }
        self.closed.lock().await.put(correlation_id.to_string(), ());
    }
}
