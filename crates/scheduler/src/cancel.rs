//! Cancellation token for jobs
//!
//! A job owns one token for its whole lifetime. The owning context cancels it
//! through `Job::cancel()`, while the code running the job (on a worker thread
//! or inside the main loop) polls it at safe checkpoints and stops early.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation token for cooperative job cancellation
///
/// Clones share the same underlying flag. Once set, the flag is never
/// cleared: a cancelled job stays cancelled.
///
/// # Example
///
/// ```
/// use pdf_editor_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
///
/// // In worker thread:
/// // if worker_token.is_cancelled() {
/// //     return; // Stop early
/// // }
///
/// // In main thread:
/// token.cancel();
/// assert!(worker_token.is_cancelled());
/// ```
#[derive(Clone, Debug)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token
    ///
    /// The token starts in a non-cancelled state.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel this token
    ///
    /// All clones of this token observe the cancellation. Returns `true` only
    /// for the call that actually flipped the flag.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    /// Check if this token has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
