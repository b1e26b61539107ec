// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Optional background compaction of admission state.
//!
//! Expiry is enforced on read; the sweeper only reclaims memory held by
//! identities and sessions that stopped sending requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::challenge::ChallengeStore;
use super::pipeline::{AdmissionPipeline, PipelineSweep};
use super::session_quota::SessionQuotaManager;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub pipeline: PipelineSweep,
    pub sessions: usize,
    pub challenges: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.pipeline.buckets
            + self.pipeline.counters
            + self.pipeline.bans
            + self.sessions
            + self.challenges
    }
}

/// Components swept together.
#[derive(Clone)]
pub struct Sweeper {
    pipeline: Arc<AdmissionPipeline>,
    quotas: Arc<SessionQuotaManager>,
    challenges: Arc<ChallengeStore>,
}

impl Sweeper {
    pub fn new(
        pipeline: Arc<AdmissionPipeline>,
        quotas: Arc<SessionQuotaManager>,
        challenges: Arc<ChallengeStore>,
    ) -> Self {
        Self {
            pipeline,
            quotas,
            challenges,
        }
    }

    pub fn sweep_once(&self) -> SweepReport {
        let report = SweepReport {
            pipeline: self.pipeline.sweep(),
            sessions: self.quotas.purge_expired(),
            challenges: self.challenges.prune_expired(),
        };
        if report.total() > 0 {
            debug!("Admission sweep removed {} entries: {:?}", report.total(), report);
        }
        report
    }

    /// Run [`Sweeper::sweep_once`] every `every` until the handle is aborted.
    pub fn spawn(self, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                self.sweep_once();
            }
        })
    }
}
