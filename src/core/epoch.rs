//! Monotonic upload epoch.
//!
//! Every download preparation advances the epoch and keeps the returned token.
//! After each suspension point the preparation checks its token against the
//! current value; once a newer preparation (or a retake) has advanced the
//! epoch, the older one must not write anything.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of the epoch taken when a preparation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochToken(u64);

impl EpochToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct UploadEpoch {
    current: AtomicU64,
}

impl UploadEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the epoch, invalidating every outstanding token.
    pub fn advance(&self) -> EpochToken {
        EpochToken(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn current(&self) -> EpochToken {
        EpochToken(self.current.load(Ordering::Acquire))
    }

    pub fn is_current(&self, token: EpochToken) -> bool {
        self.current.load(Ordering::Acquire) == token.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_invalidates_previous_tokens() {
        let epoch = UploadEpoch::new();
        let first = epoch.advance();
        assert!(epoch.is_current(first));

        let second = epoch.advance();
        assert!(!epoch.is_current(first));
        assert!(epoch.is_current(second));
        assert_eq!(second.value(), first.value() + 1);
    }
}
