// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-identity per-minute request counters used to trigger automatic bans.
//!
//! Only the current minute's count is ever compared against the threshold, so a
//! burst straddling a minute boundary can reach nearly twice the threshold
//! before a ban. Older minutes are kept briefly and pruned on each record.

use std::collections::BTreeMap;

use crate::clock::{SharedClock, MILLIS_PER_MINUTE};
use crate::config::AdmissionConfig;

use super::store::{MemoryStore, StateStore};

/// Minutes of history kept behind the current minute.
pub const RETENTION_MINUTES: u64 = 5;

/// Request counts keyed by minute epoch (`millis / 60_000`).
#[derive(Debug, Clone, Default)]
pub struct MinuteCounter {
    counts: BTreeMap<u64, u32>,
}

impl MinuteCounter {
    fn increment(&mut self, minute: u64) -> u32 {
        let count = self.counts.entry(minute).or_insert(0);
        *count = count.saturating_add(1);
        let current = *count;
        self.prune(minute);
        current
    }

    fn prune(&mut self, current_minute: u64) {
        let cutoff = current_minute.saturating_sub(RETENTION_MINUTES);
        self.counts = self.counts.split_off(&cutoff);
    }

    fn count_at(&self, minute: u64) -> u32 {
        self.counts.get(&minute).copied().unwrap_or(0)
    }

    pub fn retained_minutes(&self) -> usize {
        self.counts.len()
    }
}

pub struct AnomalyDetector<S = MemoryStore<MinuteCounter>> {
    store: S,
    clock: SharedClock,
    ban_threshold: u32,
}

impl AnomalyDetector {
    pub fn new(config: &AdmissionConfig, clock: SharedClock) -> Self {
        Self::with_store(config, clock, MemoryStore::new())
    }
}

impl<S: StateStore<MinuteCounter>> AnomalyDetector<S> {
    pub fn with_store(config: &AdmissionConfig, clock: SharedClock, store: S) -> Self {
        Self {
            store,
            clock,
            ban_threshold: config.ban_threshold,
        }
    }

    fn current_minute(&self) -> u64 {
        self.clock.now_millis() / MILLIS_PER_MINUTE
    }

    /// Count one request for `identity`.
    ///
    /// Returns `true` when this minute's count exceeds the ban threshold; the
    /// caller is expected to ban the identity.
    pub fn record(&self, identity: &str) -> bool {
        let minute = self.current_minute();
        let count = self
            .store
            .update(identity, MinuteCounter::default, |counter| {
                counter.increment(minute)
            });
        count > self.ban_threshold
    }

    /// Requests recorded for `identity` in the current minute.
    pub fn current_count(&self, identity: &str) -> u32 {
        let minute = self.current_minute();
        self.store
            .read(identity, |counter| counter.count_at(minute))
            .unwrap_or(0)
    }

    pub fn ban_threshold(&self) -> u32 {
        self.ban_threshold
    }

    pub fn tracked_identities(&self) -> usize {
        self.store.len()
    }

    /// Drop identities with no minute inside the retention window.
    pub fn sweep(&self) -> usize {
        let minute = self.current_minute();
        let before = self.store.len();
        self.store.retain(|_, counter| {
            counter.prune(minute);
            counter.retained_minutes() > 0
        });
        before.saturating_sub(self.store.len())
    }
}
