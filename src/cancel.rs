//! Cooperative cancellation: a unique writer ([`CancelSource`]) and
//! cheap shared readers ([`CancelToken`]) over one monotonic atomic
//! flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
}

impl CancelState {
    fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Owns the cancellation flag and issues tokens observing it.
#[derive(Debug)]
pub struct CancelSource {
    state: Arc<CancelState>,
}

impl CancelSource {
    /// Fresh source in the not-cancelled state.
    pub fn new() -> Self {
        Self {
            state: Arc::new(CancelState::default()),
        }
    }

    /// A token sharing this source's state.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            state: Some(self.state.clone()),
        }
    }

    /// Set the flag. Idempotent; the flag is never reset.
    pub fn request_cancel(&self) {
        self.state.request_cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a cancellation flag.
///
/// The default token is empty: it can never observe cancellation. Tokens
/// are cheap to clone and safe to move across threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Option<Arc<CancelState>>,
}

impl CancelToken {
    /// Whether this token is bound to a source at all.
    pub fn can_cancel(&self) -> bool {
        self.state.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.as_ref().map(|s| s.is_cancelled()).unwrap_or(false)
    }
}
