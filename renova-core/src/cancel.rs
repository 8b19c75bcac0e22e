use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop signal for one run.
///
/// A fresh token is created per run by whoever starts it; clones share the
/// same flag, so the control layer keeps one clone to service stop requests
/// while the engine polls its own between records. The engine never checks
/// the flag mid-record: an in-flight record always finishes (or fails) before
/// cancellation takes effect.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop. Idempotent, and harmless when no run is polling.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clears the flag. Called at the start of every run so a stale request
    /// from a previous run can never abort a new one immediately.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_request_is_visible_through_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!token.should_stop());
        other.request_stop();
        assert!(token.should_stop());
    }

    #[test]
    fn request_stop_is_idempotent() {
        let token = CancelToken::new();
        token.request_stop();
        token.request_stop();
        assert!(token.should_stop());
    }

    #[test]
    fn reset_clears_a_stale_request() {
        let token = CancelToken::new();
        token.request_stop();
        token.reset();
        assert!(!token.should_stop());
    }
}
