// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-use arithmetic challenges for human verification.

use std::time::Duration;

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::clock::{elapsed_millis, SharedClock};

use super::store::{MemoryStore, StateStore};

pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(5 * 60);

/// Random bytes in a challenge token (128 bits, 32 hex characters).
pub const TOKEN_BYTES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChallengeFailure {
    #[error("challenge not found or already used")]
    NotFound,
    #[error("challenge expired")]
    Expired,
    #[error("wrong answer")]
    WrongAnswer,
}

/// A challenge handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedChallenge {
    pub token: String,
    pub question: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PendingChallenge {
    answer: i64,
    created_at_ms: u64,
}

pub struct ChallengeStore<S = MemoryStore<PendingChallenge>> {
    store: S,
    clock: SharedClock,
    ttl_ms: u64,
}

impl ChallengeStore {
    pub fn new(clock: SharedClock) -> Self {
        Self::with_store(clock, MemoryStore::new())
    }
}

impl<S: StateStore<PendingChallenge>> ChallengeStore<S> {
    pub fn with_store(clock: SharedClock, store: S) -> Self {
        Self {
            store,
            clock,
            ttl_ms: DEFAULT_CHALLENGE_TTL.as_millis() as u64,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = ttl.as_millis() as u64;
        self
    }

    fn is_expired(&self, challenge: &PendingChallenge, now: u64) -> bool {
        elapsed_millis(now, challenge.created_at_ms) > self.ttl_ms
    }

    /// Issue a new `a + b = ?` challenge drawn from the OS random source.
    pub fn issue(&self) -> IssuedChallenge {
        self.issue_with_rng(&mut OsRng)
    }

    pub fn issue_with_rng<R: RngCore + CryptoRng>(&self, rng: &mut R) -> IssuedChallenge {
        let a: u32 = rng.gen_range(1..=10);
        let b: u32 = rng.gen_range(1..=10);
        let mut token = [0u8; TOKEN_BYTES];
        rng.fill_bytes(&mut token);
        self.insert(hex::encode(token), a, b)
    }

    fn insert(&self, token: String, a: u32, b: u32) -> IssuedChallenge {
        self.prune_expired();

        let now = self.clock.now_millis();
        let answer = i64::from(a) + i64::from(b);
        self.store.update(
            &token,
            || PendingChallenge {
                answer,
                created_at_ms: now,
            },
            |_| (),
        );

        IssuedChallenge {
            token,
            question: format!("{} + {} = ?", a, b),
        }
    }

    /// Consume the challenge for `token` and check `answer`.
    ///
    /// The challenge is removed whatever the outcome, so a token can never be
    /// verified twice.
    pub fn verify(&self, token: &str, answer: i64) -> Result<(), ChallengeFailure> {
        let challenge = self
            .store
            .remove(token)
            .ok_or(ChallengeFailure::NotFound)?;

        if self.is_expired(&challenge, self.clock.now_millis()) {
            return Err(ChallengeFailure::Expired);
        }
        if challenge.answer != answer {
            return Err(ChallengeFailure::WrongAnswer);
        }
        Ok(())
    }

    pub fn is_valid(&self, token: &str, answer: i64) -> bool {
        self.verify(token, answer).is_ok()
    }

    pub fn pending(&self) -> usize {
        self.store.len()
    }

    /// Drop expired challenges; also runs on every issue.
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.store.len();
        self.store
            .retain(|_, challenge| !self.is_expired(challenge, now));
        let pruned = before.saturating_sub(self.store.len());
        if pruned > 0 {
            debug!("Pruned {} expired challenges", pruned);
        }
        pruned
    }
}
