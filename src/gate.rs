//! ConcurrencyGate - admission control for streaming work
//!
//! A single process-wide counting semaphore caps the number of concurrently
//! running streams. Admission waits up to a bounded timeout for a slot; a
//! timeout is a normal, retryable condition, not a fault.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admission gate over a bounded pool of stream slots
///
/// The returned [`OwnedSemaphorePermit`] releases its slot when dropped, so a
/// slot can only ever be released by the caller that acquired it, exactly once.
#[derive(Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    max_streams: usize,
}

impl ConcurrencyGate {
    /// Create a gate with the given number of slots
    pub fn new(max_streams: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_streams)),
            max_streams,
        }
    }

    /// Try to acquire a stream slot, waiting up to `timeout`
    ///
    /// Returns `None` on timeout; the caller must not start a stream.
    pub async fn acquire(&self, timeout: Duration) -> Option<OwnedSemaphorePermit> {
        match tokio::time::timeout(timeout, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Some(permit),
            // Closed semaphore only happens on shutdown; treat like a timeout.
            Ok(Err(_)) => None,
            Err(_) => {
                tracing::warn!(
                    max_streams = self.max_streams,
                    "[ConcurrencyGate] Admission timed out"
                );
                None
            }
        }
    }

    /// Number of slots currently available
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.max_streams
    }
}

impl std::fmt::Debug for ConcurrencyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyGate")
            .field("max_streams", &self.max_streams)
            .field("available", &self.available())
            .finish()
    }
}
