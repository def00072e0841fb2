//! Cooperative cancellation for long-running passes
//!
//! Whole-document passes run on blocking worker threads where a oneshot
//! receiver cannot be polled, so they check a shared flag between tokens
//! instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Returned by a pass that observed its cancel flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("pass cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
