//! Time sources.
//!
//! Period boundaries are evaluated lazily against "now", so the engine only
//! ever asks a [`Clock`] for the current second.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of the current time in seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current timestamp.
    fn now(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    #[must_use]
    pub fn new(now: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now)),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `seconds`.
    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
