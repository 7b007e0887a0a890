//! Process-global, FIFO-fair cap on concurrent extraction calls.
//!
//! `tokio::sync::Semaphore` already wakes waiters in arrival order, so the
//! pool is a thin typed wrapper rather than a hand-rolled queue: the point
//! is the `Drop`-released guard, which makes slot leaks on cancellation
//! structurally impossible.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds global concurrent extraction calls to `MAX_GLOBAL_EXTRACTIONS`.
#[derive(Clone, Debug)]
pub struct ExtractionPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// RAII handle on one outstanding extraction slot. Releases on drop.
pub struct PoolPermit {
    _permit: OwnedSemaphorePermit,
}

impl ExtractionPool {
    #[must_use]
    pub fn new(max_global_extractions: usize) -> Self {
        let capacity = max_global_extractions.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Suspend until a slot is free, then hold it until the returned guard drops.
    pub async fn acquire(&self) -> PoolPermit {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("extraction pool semaphore is never closed");
        PoolPermit { _permit: permit }
    }

    /// Number of slots currently in use.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
