use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ValidatorError;

/// Cooperative cancellation flag for a validation call.
///
/// Clones share the flag, so a handle can be given to another thread that
/// requests cancellation while validation runs.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), ValidatorError> {
        if self.is_cancelled() {
            Err(ValidatorError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_flag() {
        let handle = CancelHandle::new();
        let remote = handle.clone();
        assert!(handle.check().is_ok());
        remote.cancel();
        assert!(handle.is_cancelled());
        assert!(matches!(handle.check(), Err(ValidatorError::Cancelled)));
    }

    #[test]
    fn cancel_from_another_thread() {
        let handle = CancelHandle::new();
        let remote = handle.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(handle.is_cancelled());
    }
}
