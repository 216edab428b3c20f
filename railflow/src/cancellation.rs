//! Cooperative cancellation for pipeline execution.
//!
//! Cancellation is polled by the executor at step boundaries only: an
//! in-flight operation is never interrupted, only new step starts are
//! prevented. The token is cheap to clone via `Arc` and safe to signal
//! from any thread.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Token for requesting cancellation of a running pipeline.
pub struct CancellationToken {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl CancellationToken {
    /// Creates a new, unsignalled token.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Requests cancellation with a reason.
    ///
    /// Idempotent: only the first reason is stored.
    pub fn cancel(&self, reason: impl Into<String>) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            *self.reason.lock() = Some(reason.into());
        }
    }

    /// Returns the cancellation reason, if cancelled.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            reason: Mutex::new(None),
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
