// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/metrics.rs - Admission metrics and Prometheus text export

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::admission::Denial;

/// Outcome label for admitted requests
pub const OUTCOME_ALLOWED: &str = "allowed";

/// Sizes of the in-memory admission stores at scrape time
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreSizes {
    pub rate_buckets: usize,
    pub anomaly_counters: usize,
    pub bans: usize,
    pub sessions: usize,
    pub challenges: usize,
}

pub struct AdmissionMetrics {
    registry: Registry,
    decisions: IntCounterVec,
    chat_turns: IntCounter,
    chat_failures: IntCounter,
    challenges_issued: IntCounter,
    challenges_verified: IntCounterVec,
    tracked_rate_buckets: IntGauge,
    tracked_anomaly_counters: IntGauge,
    active_bans: IntGauge,
    tracked_sessions: IntGauge,
    pending_challenges: IntGauge,
}

impl AdmissionMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let decisions = IntCounterVec::new(
            Opts::new(
                "admission_decisions_total",
                "Admission decisions by outcome",
            ),
            &["outcome"],
        )?;
        let chat_turns = IntCounter::new("chat_turns_total", "Completed chat turns")?;
        let chat_failures = IntCounter::new(
            "chat_failures_total",
            "Chat turns that failed upstream without consuming quota",
        )?;
        let challenges_issued =
            IntCounter::new("challenges_issued_total", "Challenges issued")?;
        let challenges_verified = IntCounterVec::new(
            Opts::new(
                "challenges_verified_total",
                "Challenge verification attempts by result",
            ),
            &["result"],
        )?;
        let tracked_rate_buckets =
            IntGauge::new("admission_rate_buckets", "Identities with token buckets")?;
        let tracked_anomaly_counters = IntGauge::new(
            "admission_anomaly_counters",
            "Identities with per-minute request counters",
        )?;
        let active_bans = IntGauge::new("admission_bans", "Stored ban records")?;
        let tracked_sessions =
            IntGauge::new("admission_sessions", "Sessions with a conversation quota")?;
        let pending_challenges =
            IntGauge::new("admission_pending_challenges", "Unverified challenges")?;

        registry.register(Box::new(decisions.clone()))?;
        registry.register(Box::new(chat_turns.clone()))?;
        registry.register(Box::new(chat_failures.clone()))?;
        registry.register(Box::new(challenges_issued.clone()))?;
        registry.register(Box::new(challenges_verified.clone()))?;
        registry.register(Box::new(tracked_rate_buckets.clone()))?;
        registry.register(Box::new(tracked_anomaly_counters.clone()))?;
        registry.register(Box::new(active_bans.clone()))?;
        registry.register(Box::new(tracked_sessions.clone()))?;
        registry.register(Box::new(pending_challenges.clone()))?;

        Ok(Self {
            registry,
            decisions,
            chat_turns,
            chat_failures,
            challenges_issued,
            challenges_verified,
            tracked_rate_buckets,
            tracked_anomaly_counters,
            active_bans,
            tracked_sessions,
            pending_challenges,
        })
    }

    pub fn record_allowed(&self) {
        self.decisions.with_label_values(&[OUTCOME_ALLOWED]).inc();
    }

    pub fn record_denial(&self, denial: &Denial) {
        self.decisions.with_label_values(&[denial.label()]).inc();
    }

    pub fn record_chat_turn(&self) {
        self.chat_turns.inc();
    }

    pub fn record_chat_failure(&self) {
        self.chat_failures.inc();
    }

    pub fn record_challenge_issued(&self) {
        self.challenges_issued.inc();
    }

    pub fn record_challenge_verified(&self, valid: bool) {
        let result = if valid { "valid" } else { "invalid" };
        self.challenges_verified.with_label_values(&[result]).inc();
    }

    pub fn decision_count(&self, outcome: &str) -> u64 {
        self.decisions.with_label_values(&[outcome]).get()
    }

    pub fn set_store_sizes(&self, sizes: StoreSizes) {
        self.tracked_rate_buckets.set(sizes.rate_buckets as i64);
        self.tracked_anomaly_counters.set(sizes.anomaly_counters as i64);
        self.active_bans.set(sizes.bans as i64);
        self.tracked_sessions.set(sizes.sessions as i64);
        self.pending_challenges.set(sizes.challenges as i64);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
