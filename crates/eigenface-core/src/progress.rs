//! Shared progress status for long-running training.
//!
//! One worker writes, any number of observers poll. Last write wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct StatusInner {
    message: String,
    finished: bool,
}

/// Clone-able handle to a single status line.
#[derive(Debug, Clone, Default)]
pub struct ProgressStatus {
    inner: Arc<Mutex<StatusInner>>,
}

impl ProgressStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current message and mark the status as in progress.
    pub fn advance(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(stage = %message, "progress");
        let mut inner = self.lock();
        inner.message = message;
        inner.finished = false;
    }

    /// Current message (empty before the first `advance`).
    pub fn message(&self) -> String {
        self.lock().message.clone()
    }

    pub fn finish(&self) {
        self.lock().finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    /// A writer that panicked leaves the last stage it reached in place.
    fn lock(&self) -> MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("progress status lock poisoned; keeping last stage");
            PoisonError::into_inner(poisoned)
        })
    }
}
