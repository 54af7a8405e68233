//! Admission gate bounding simultaneous fetches.
//!
//! A thin wrapper over [`tokio::sync::Semaphore`]. Waiters are served in FIFO order, so every
//! worker eventually gets a permit. The permit is an RAII guard: dropping it (on success,
//! failure, or panic unwinding) returns the slot and wakes the next waiter.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Counting semaphore shared by all workers of a run (cloneable, Arc-wrapped)
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
}

/// Held while a worker is inside its network-I/O-and-write critical section
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl AdmissionGate {
    /// Create a gate admitting at most `capacity` holders at once
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config("concurrency", "must be at least 1"));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Wait for a permit
    pub async fn acquire(&self) -> Result<GatePermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::ShuttingDown)?;
        Ok(self.admit(permit))
    }

    /// Wait for a permit unless `cancel` fires first
    ///
    /// Returns `None` when cancelled; the caller must not start work in that case.
    pub async fn acquire_or_cancel(&self, cancel: &CancellationToken) -> Option<GatePermit> {
        if cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = self.acquire() => permit.ok(),
        }
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently held
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> GatePermit {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        GatePermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl GatePermit {
    /// Give the permit back early; equivalent to dropping it
    pub fn release(self) {}
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
