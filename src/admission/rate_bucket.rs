// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-identity dual-window token buckets (minute + hour).

use std::time::Duration;

use crate::clock::{elapsed_millis, SharedClock};
use crate::config::AdmissionConfig;

use super::store::{MemoryStore, StateStore};

pub const MINUTE_WINDOW: Duration = Duration::from_secs(60);
pub const HOUR_WINDOW: Duration = Duration::from_secs(3600);

/// Token bucket that is restored to capacity once per elapsed interval
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: u32,
    tokens: u32,
    interval_ms: u64,
    last_refill_ms: u64,
}

impl TokenBucket {
    pub fn new(capacity: u32, interval: Duration, now_ms: u64) -> Self {
        Self {
            capacity,
            tokens: capacity,
            interval_ms: (interval.as_millis() as u64).max(1),
            last_refill_ms: now_ms,
        }
    }

    /// Restore the bucket if at least one full interval passed since the last refill.
    /// The refill anchor advances by whole intervals so refills stay on the bucket's own schedule.
    pub fn refill(&mut self, now_ms: u64) {
        let elapsed = elapsed_millis(now_ms, self.last_refill_ms);
        if elapsed >= self.interval_ms {
            let intervals = elapsed / self.interval_ms;
            self.tokens = self.capacity;
            self.last_refill_ms += intervals * self.interval_ms;
        }
    }

    pub fn available_tokens(&self) -> u32 {
        self.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.tokens >= self.capacity
    }

    /// Milliseconds until the next refill.
    pub fn retry_after_ms(&self, now_ms: u64) -> u64 {
        self.interval_ms
            .saturating_sub(elapsed_millis(now_ms, self.last_refill_ms))
    }
}

/// Minute and hour buckets for one identity.
#[derive(Debug, Clone)]
pub struct BucketPair {
    minute: TokenBucket,
    hour: TokenBucket,
}

impl BucketPair {
    fn new(per_minute: u32, per_hour: u32, now_ms: u64) -> Self {
        Self {
            minute: TokenBucket::new(per_minute, MINUTE_WINDOW, now_ms),
            hour: TokenBucket::new(per_hour, HOUR_WINDOW, now_ms),
        }
    }

    fn refill(&mut self, now_ms: u64) {
        self.minute.refill(now_ms);
        self.hour.refill(now_ms);
    }

    /// Take one token from each bucket, or none if either is empty.
    fn try_consume(&mut self, now_ms: u64) -> bool {
        self.refill(now_ms);
        if self.minute.tokens == 0 || self.hour.tokens == 0 {
            return false;
        }
        self.minute.tokens -= 1;
        self.hour.tokens -= 1;
        true
    }

    fn is_idle(&self) -> bool {
        self.minute.is_full() && self.hour.is_full()
    }
}

/// Remaining tokens for an identity in each window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSnapshot {
    pub minute: u32,
    pub hour: u32,
}

pub struct RateBucketStore<S = MemoryStore<BucketPair>> {
    store: S,
    clock: SharedClock,
    per_minute: u32,
    per_hour: u32,
}

impl RateBucketStore {
    pub fn new(config: &AdmissionConfig, clock: SharedClock) -> Self {
        Self::with_store(config, clock, MemoryStore::new())
    }
}

impl<S: StateStore<BucketPair>> RateBucketStore<S> {
    pub fn with_store(config: &AdmissionConfig, clock: SharedClock, store: S) -> Self {
        Self {
            store,
            clock,
            per_minute: config.max_requests_per_minute,
            per_hour: config.max_requests_per_hour,
        }
    }

    /// Admit one request for `identity` if both windows have a token left.
    pub fn try_consume(&self, identity: &str) -> bool {
        let now = self.clock.now_millis();
        let (per_minute, per_hour) = (self.per_minute, self.per_hour);
        self.store.update(
            identity,
            || BucketPair::new(per_minute, per_hour, now),
            |pair| pair.try_consume(now),
        )
    }

    /// Tokens left without creating state; unknown identities report full capacity.
    pub fn available(&self, identity: &str) -> BucketSnapshot {
        let now = self.clock.now_millis();
        self.store
            .read(identity, |pair| {
                let mut pair = pair.clone();
                pair.refill(now);
                BucketSnapshot {
                    minute: pair.minute.available_tokens(),
                    hour: pair.hour.available_tokens(),
                }
            })
            .unwrap_or(BucketSnapshot {
                minute: self.per_minute,
                hour: self.per_hour,
            })
    }

    pub fn tracked_identities(&self) -> usize {
        self.store.len()
    }

    /// Drop identities whose buckets have fully refilled; they are
    /// indistinguishable from a freshly created pair.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.store.len();
        self.store.retain(|_, pair| {
            pair.refill(now);
            !pair.is_idle()
        });
        before.saturating_sub(self.store.len())
    }
}
