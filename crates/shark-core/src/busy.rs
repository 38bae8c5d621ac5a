//! Single-flight flag for user-triggered async actions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared in-flight flag with RAII release.
///
/// Actions that must not overlap (chat sends, review queries) claim the
/// flag before starting; the claim is released when the guard drops, on
/// every exit path including panics.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Claim the flag. Returns `None` when an action is already in flight.
    pub fn acquire(&self) -> Option<BusyGuard> {
        if self.0.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(BusyGuard(self.0.clone()))
    }
}

/// Clears the owning [`BusyFlag`] on drop.
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_blocks_second_claim() {
        let flag = BusyFlag::new();
        let guard = flag.acquire();
        assert!(guard.is_some());
        assert!(flag.is_busy());
        assert!(flag.acquire().is_none());
    }

    #[test]
    fn test_drop_releases() {
        let flag = BusyFlag::new();
        {
            let _guard = flag.acquire().unwrap();
            assert!(flag.is_busy());
        }
        assert!(!flag.is_busy());
        assert!(flag.acquire().is_some());
    }

    #[test]
    fn test_release_on_panic() {
        let flag = BusyFlag::new();
        let inner = flag.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = inner.acquire().unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!flag.is_busy());
    }
}
