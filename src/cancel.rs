//! Cooperative cancellation of a download session.
//!
//! The orchestrator owns the write side ([`CancellationController::request_cancel`]); the
//! session worker checks [`CancellationController::is_cancel_requested`] between records and
//! races pending reads against [`CancellationController::cancelled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle to a cancellation controller.
pub type SharedCancel = Arc<CancellationController>;

/// Single cancel flag plus a wakeup for tasks waiting on it.
#[derive(Debug, Default)]
pub struct CancellationController {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationController {
    /// Create a controller with the flag cleared.
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Create a new shared controller wrapped in [`Arc`].
    pub fn shared() -> SharedCancel {
        Arc::new(Self::new())
    }

    /// Set the flag. Waiters are woken on the first call only.
    pub fn request_cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancel_requested(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation is requested. Returns immediately if already set.
    pub async fn cancelled(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent request is not missed.
        notified.as_mut().enable();
        if self.is_cancel_requested() {
            return;
        }
        notified.await;
    }
}
