//! Bounded worker pool
//!
//! The pool is a counting semaphore with a fixed number of permits. A unit
//! of work may only start once it holds a permit, so callers that submit
//! more work than the pool can run simply wait. Closing the semaphore is the
//! only way to make submissions fail.

use crate::error::{ConfigurationError, DispatchError};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Snapshot of pool usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolMetrics {
    /// Configured upper bound on running work
    pub capacity: usize,
    /// Units of work currently holding a permit
    pub active: usize,
    /// Highest value `active` has reached
    pub peak_active: usize,
    /// Total permits handed out
    pub submitted: u64,
    /// Total permits returned
    pub completed: u64,
}

#[derive(Debug, Default)]
struct PoolCounters {
    active: AtomicUsize,
    peak_active: AtomicUsize,
    submitted: AtomicU64,
    completed: AtomicU64,
}

#[derive(Debug)]
pub struct WorkerPool {
    name: String,
    capacity: usize,
    semaphore: Arc<Semaphore>,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if capacity == 0 {
            return Err(ConfigurationError::InvalidPoolSize { pool: name });
        }

        debug!(pool = %name, capacity, "Created worker pool");
        Ok(Self {
            name,
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            counters: Arc::new(PoolCounters::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait for a free slot.
    ///
    /// Fails only when the pool has been shut down, including while waiting.
    pub async fn acquire(&self) -> Result<WorkerPermit, DispatchError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| DispatchError::PoolShutdown {
                pool: self.name.clone(),
            })?;

        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak_active.fetch_max(active, Ordering::SeqCst);
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);

        Ok(WorkerPermit {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        })
    }

    /// Run `work` on a detached task that releases `permit` when it finishes.
    ///
    /// Dropping the returned handle does not cancel the work.
    pub fn spawn<F>(&self, permit: WorkerPermit, work: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(async move {
            let output = work.await;
            drop(permit);
            output
        })
    }

    /// Acquire a permit, then spawn `work` with it
    pub async fn submit<F>(&self, work: F) -> Result<JoinHandle<F::Output>, DispatchError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = self.acquire().await?;
        Ok(self.spawn(permit, work))
    }

    /// Stop accepting work. Pending and future submissions fail; running work is left alone.
    pub fn shutdown(&self) {
        if !self.semaphore.is_closed() {
            info!(pool = %self.name, "Shutting down worker pool");
            self.semaphore.close();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            capacity: self.capacity,
            active: self.counters.active.load(Ordering::SeqCst),
            peak_active: self.counters.peak_active.load(Ordering::SeqCst),
            submitted: self.counters.submitted.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
        }
    }
}

/// Slot in a [`WorkerPool`]; the slot is freed when this is dropped
#[derive(Debug)]
pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<PoolCounters>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
        self.counters.completed.fetch_add(1, Ordering::SeqCst);
    }
}
