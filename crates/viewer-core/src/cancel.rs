//! Cooperative cancellation for the thumbnail worker.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared cancel flag. Clones observe the same state; the worker checks it
/// between pages and stops early once it is set.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
