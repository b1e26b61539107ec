// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-session conversation quotas.
//!
//! A session's record is created on its first turn and expires 24
//! hours later, after which it reads as a brand new session.

use std::time::Duration;

use tracing::debug;

use crate::clock::{elapsed_millis, SharedClock};
use crate::config::AdmissionConfig;

use super::store::{MemoryStore, StateStore};

pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionQuota {
    pub used: u32,
    /// Turns admitted by [`SessionQuotaManager::begin_turn`] and not yet settled.
    pub in_flight: u32,
    pub created_at_ms: u64,
}

impl SessionQuota {
    fn fresh(now: u64) -> Self {
        Self {
            used: 0,
            in_flight: 0,
            created_at_ms: now,
        }
    }
}

pub struct SessionQuotaManager<S = MemoryStore<SessionQuota>> {
    store: S,
    clock: SharedClock,
    max_conversations: u32,
    ttl_ms: u64,
}

impl SessionQuotaManager {
    pub fn new(config: &AdmissionConfig, clock: SharedClock) -> Self {
        Self::with_store(config, clock, MemoryStore::new())
    }
}

impl<S: StateStore<SessionQuota>> SessionQuotaManager<S> {
    pub fn with_store(config: &AdmissionConfig, clock: SharedClock, store: S) -> Self {
        Self {
            store,
            clock,
            max_conversations: config.max_conversations_per_session,
            ttl_ms: SESSION_TTL.as_millis() as u64,
        }
    }

    fn is_expired(&self, quota: &SessionQuota, now: u64) -> bool {
        elapsed_millis(now, quota.created_at_ms) > self.ttl_ms
    }

    /// Purge expired sessions, then report whether `session_id` has turns left.
    pub fn can_chat(&self, session_id: &str) -> bool {
        self.purge_expired();
        self.used_count(session_id) < self.max_conversations
    }

    /// Record one completed turn and return the new used count.
    ///
    /// Call only after the protected action succeeded so failures never
    /// consume quota.
    pub fn increment(&self, session_id: &str) -> u32 {
        let now = self.clock.now_millis();
        let ttl_ms = self.ttl_ms;
        self.store.update(
            session_id,
            || SessionQuota::fresh(now),
            |quota| {
                if elapsed_millis(now, quota.created_at_ms) > ttl_ms {
                    *quota = SessionQuota::fresh(now);
                }
                quota.used = quota.used.saturating_add(1);
                quota.used
            },
        )
    }

    /// Reserve one turn for `session_id` if used plus in-flight turns stay
    /// under the maximum.
    ///
    /// Concurrent requests on the same session cannot overshoot the quota: the
    /// check and the reservation happen under the session's lock. Settle the
    /// reservation with [`TurnReservation::complete`] once the turn succeeded;
    /// dropping it releases the slot without consuming quota.
    pub fn begin_turn(&self, session_id: &str) -> Option<TurnReservation<'_, S>> {
        self.purge_expired();
        let now = self.clock.now_millis();
        let ttl_ms = self.ttl_ms;
        let max = self.max_conversations;
        let reserved = self.store.update(
            session_id,
            || SessionQuota::fresh(now),
            |quota| {
                if elapsed_millis(now, quota.created_at_ms) > ttl_ms {
                    *quota = SessionQuota::fresh(now);
                }
                if quota.used.saturating_add(quota.in_flight) >= max {
                    return false;
                }
                quota.in_flight += 1;
                true
            },
        );

        reserved.then(|| TurnReservation {
            manager: self,
            session_id: session_id.to_string(),
            settled: false,
        })
    }

    /// Turns used so far; expired or unknown sessions report zero.
    pub fn used_count(&self, session_id: &str) -> u32 {
        let now = self.clock.now_millis();
        self.store
            .read(session_id, |quota| {
                if self.is_expired(quota, now) {
                    0
                } else {
                    quota.used
                }
            })
            .unwrap_or(0)
    }

    pub fn remaining_count(&self, session_id: &str) -> u32 {
        self.max_conversations
            .saturating_sub(self.used_count(session_id))
    }

    /// Forget a session entirely (used on session restart).
    pub fn reset(&self, session_id: &str) -> bool {
        self.store.remove(session_id).is_some()
    }

    pub fn max_conversations(&self) -> u32 {
        self.max_conversations
    }

    pub fn tracked_sessions(&self) -> usize {
        self.store.len()
    }

    /// Remove every session older than the TTL; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.store.len();
        self.store.retain(|_, quota| !self.is_expired(quota, now));
        let purged = before.saturating_sub(self.store.len());
        if purged > 0 {
            debug!("Purged {} expired sessions", purged);
        }
        purged
    }
}

/// A quota slot held while a turn is in progress.
#[must_use = "dropping a reservation releases the slot without recording the turn"]
pub struct TurnReservation<'a, S: StateStore<SessionQuota>> {
    manager: &'a SessionQuotaManager<S>,
    session_id: String,
    settled: bool,
}

impl<S: StateStore<SessionQuota>> TurnReservation<'_, S> {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Convert the reserved slot into a used turn; returns the new used count.
    pub fn complete(mut self) -> u32 {
        self.settled = true;
        let now = self.manager.clock.now_millis();
        self.manager.store.update(
            &self.session_id,
            || SessionQuota::fresh(now),
            |quota| {
                quota.in_flight = quota.in_flight.saturating_sub(1);
                quota.used = quota.used.saturating_add(1);
                quota.used
            },
        )
    }
}

impl<S: StateStore<SessionQuota>> Drop for TurnReservation<'_, S> {
    fn drop(&mut self) {
        if !self.settled {
            self.manager.store.modify(&self.session_id, |quota| {
                quota.in_flight = quota.in_flight.saturating_sub(1);
            });
        }
    }
}
