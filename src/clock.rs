// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Time source shared by every admission component.
//!
//! All expiry and refill arithmetic reads from one injected [`Clock`] so tests
//! can move time forward deterministically instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds in one minute, the granularity of anomaly counters.
pub const MILLIS_PER_MINUTE: u64 = 60_000;

/// Source of the current wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Clock handle passed into component constructors.
pub type SharedClock = Arc<dyn Clock>;

/// Real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn shared() -> SharedClock {
        Arc::new(SystemClock)
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        // A clock before 1970 reads as zero rather than aborting the process
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct MockClock {
    millis: AtomicU64,
}

impl MockClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(start_millis),
        }
    }

    /// Shared handle starting at `start_millis`.
    pub fn shared_at(start_millis: u64) -> Arc<Self> {
        Arc::new(Self::new(start_millis))
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Milliseconds elapsed between `since` and `now`, zero if the clock went backwards.
pub(crate) fn elapsed_millis(now: u64, since: u64) -> u64 {
    now.saturating_sub(since)
}
