// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Temporary per-identity bans with lazy expiry.

use std::time::Duration;

use tracing::{debug, warn};

use crate::clock::{elapsed_millis, SharedClock};
use crate::config::AdmissionConfig;

use super::store::{MemoryStore, StateStore};

/// Ban start time in milliseconds.
pub type BannedAt = u64;

pub struct BanRegistry<S = MemoryStore<BannedAt>> {
    store: S,
    clock: SharedClock,
    duration_ms: u64,
}

impl BanRegistry {
    pub fn new(config: &AdmissionConfig, clock: SharedClock) -> Self {
        Self::with_store(config, clock, MemoryStore::new())
    }
}

impl<S: StateStore<BannedAt>> BanRegistry<S> {
    pub fn with_store(config: &AdmissionConfig, clock: SharedClock, store: S) -> Self {
        Self {
            store,
            clock,
            duration_ms: config.ban_duration().as_millis() as u64,
        }
    }

    fn is_active(&self, banned_at: BannedAt, now: u64) -> bool {
        elapsed_millis(now, banned_at) < self.duration_ms
    }

    /// Ban `identity` from now on.
    ///
    /// An active ban keeps its original start time; an expired record is
    /// replaced. Returns `true` if a new ban started.
    pub fn ban(&self, identity: &str) -> bool {
        let now = self.clock.now_millis();
        let mut inserted = false;
        let restarted = self.store.update(
            identity,
            || {
                inserted = true;
                now
            },
            |banned_at| {
                if elapsed_millis(now, *banned_at) >= self.duration_ms {
                    *banned_at = now;
                    true
                } else {
                    false
                }
            },
        );

        let started = inserted || restarted;
        if started {
            warn!(
                "Banned {} for {} minutes",
                identity,
                self.duration_ms / 60_000
            );
        }
        started
    }

    /// Whether `identity` is inside an active ban window.
    ///
    /// An expired record is removed as a side effect.
    pub fn is_banned(&self, identity: &str) -> bool {
        let now = self.clock.now_millis();
        let Some(banned_at) = self.store.read(identity, |banned_at| *banned_at) else {
            return false;
        };
        if self.is_active(banned_at, now) {
            return true;
        }

        // Re-checked under the key lock so a concurrent re-ban survives
        if self
            .store
            .remove_if(identity, |banned_at| !self.is_active(*banned_at, now))
            .is_some()
        {
            debug!("Ban expired for {}", identity);
        }
        false
    }

    /// Time left on an active ban.
    pub fn remaining(&self, identity: &str) -> Option<Duration> {
        let now = self.clock.now_millis();
        self.store
            .read(identity, |banned_at| *banned_at)
            .filter(|banned_at| self.is_active(*banned_at, now))
            .map(|banned_at| {
                Duration::from_millis(self.duration_ms - elapsed_millis(now, banned_at))
            })
    }

    /// Lift a ban early. Returns `true` if a record existed.
    pub fn unban(&self, identity: &str) -> bool {
        self.store.remove(identity).is_some()
    }

    pub fn ban_duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Number of stored ban records, including any not yet lazily expired.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.store.len();
        self.store
            .retain(|_, banned_at| self.is_active(*banned_at, now));
        before.saturating_sub(self.store.len())
    }
}
