//! Session-wide cancellation and statistics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative shutdown flag shared by the capture callback and the controller.
///
/// Set once by the controller; both threads poll it. Cloning shares the flag.
///
/// # Example
///
/// ```
/// use cli_vis::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not yet cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once [`cancel()`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Statistics about a visualizer session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames published by the capture bridge.
    pub frames_produced: u64,
    /// Frames analyzed and drawn.
    pub frames_rendered: u64,
    /// Frames overwritten in the queue before the consumer reached them.
    pub frames_dropped: u64,
    /// Frames skipped by the consumer to stay on the newest one.
    pub frames_skipped: u64,
    /// Callbacks rejected as malformed.
    pub callback_failures: u64,
    /// Non-fatal errors reported by the audio backend.
    pub stream_errors: u64,
    /// Frames skipped because drawing or the transform failed.
    pub render_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_clear() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_token_cancel_is_shared_and_idempotent() {
        let token = CancellationToken::new();
        let other = token.clone();
        other.cancel();
        other.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_session_stats_default() {
        let stats = SessionStats::default();
        assert_eq!(stats.frames_produced, 0);
        assert_eq!(stats.frames_rendered, 0);
        assert_eq!(stats.frames_dropped, 0);
    }
}
