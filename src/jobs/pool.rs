//! Bounded worker pool for chunk calls.
//!
//! Every chunk call holds a [`WorkerPermit`] for its whole lifetime,
//! including rate-limiter waits and backoff sleeps. The pool is shared by
//! every file in a run, so `size` bounds in-flight chunk calls globally.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{CleanerError, Result};

/// Pool limiting the number of chunk calls in flight.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    sem: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with `size` workers. Fails if `size` is zero.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(CleanerError::invalid_config(
                "concurrency must be greater than 0",
            ));
        }

        Ok(Self {
            sem: Arc::new(Semaphore::new(size)),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Wait for a free worker, or fail with [`CleanerError::Cancelled`] once
    /// `cancel` fires.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<WorkerPermit> {
        if cancel.is_cancelled() {
            return Err(CleanerError::Cancelled);
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CleanerError::Cancelled),
            permit = self.sem.clone().acquire_owned() => permit,
        };

        // The semaphore is never closed; treat a closed one like cancellation.
        let permit = permit.map_err(|_| CleanerError::Cancelled)?;
        Ok(WorkerPermit { _permit: permit })
    }

    /// Number of workers currently busy.
    pub fn active_workers(&self) -> usize {
        self.size - self.sem.available_permits()
    }
}

/// A busy worker slot, released on drop.
#[derive(Debug)]
pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
}
