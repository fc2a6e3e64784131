use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AcquireError {
    #[error("cancelled while waiting for a worker slot")]
    Cancelled,
    #[error("worker pool is closed")]
    Closed,
}

/// Fixed-capacity gate shared by every probe the service runs.
///
/// Clones share the same slots. A slot is held by a [`WorkerSlot`] and goes
/// back to the pool when the slot is dropped.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One acquired slot
#[derive(Debug)]
pub struct WorkerSlot {
    _permit: OwnedSemaphorePermit,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { semaphore: Arc::new(Semaphore::new(capacity)), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait for a free slot, giving up when `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<WorkerSlot, AcquireError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AcquireError::Cancelled),
            permit = self.semaphore.clone().acquire_owned() => permit
                .map(|permit| WorkerSlot { _permit: permit })
                .map_err(|_| AcquireError::Closed),
        }
    }

    /// Stop handing out slots. Waiters fail with [`AcquireError::Closed`].
    pub fn close(&self) {
        self.semaphore.close();
    }
}
