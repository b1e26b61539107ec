// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Ordered admission checks run once per inbound request.

use tracing::warn;

use crate::clock::SharedClock;
use crate::config::AdmissionConfig;

use super::anomaly::AnomalyDetector;
use super::ban::BanRegistry;
use super::decision::{Admission, Denial};
use super::rate_bucket::RateBucketStore;

/// Case-insensitive user-agent fragments treated as automation.
pub const BLOCKED_USER_AGENTS: &[&str] = &[
    "python-requests",
    "curl",
    "wget",
    "scrapy",
    "httpclient",
    "java/",
    "go-http-client",
    "bot",
    "spider",
    "crawler",
];

/// Paths that consume rate-limit tokens by default.
pub const DEFAULT_PROTECTED_PATHS: &[&str] = &["/api/chat"];

/// Missing, empty, or denylisted agents are suspicious.
pub fn is_suspicious_agent(user_agent: Option<&str>) -> bool {
    match user_agent.map(str::trim) {
        None | Some("") => true,
        Some(agent) => {
            let agent = agent.to_lowercase();
            BLOCKED_USER_AGENTS
                .iter()
                .any(|pattern| agent.contains(pattern))
        }
    }
}

/// What the pipeline needs to know about a request.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionRequest<'a> {
    pub identity: &'a str,
    pub user_agent: Option<&'a str>,
    pub path: &'a str,
}

/// Entries removed by one sweep of the pipeline's stores.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSweep {
    pub buckets: usize,
    pub counters: usize,
    pub bans: usize,
}

pub struct AdmissionPipeline {
    buckets: RateBucketStore,
    anomalies: AnomalyDetector,
    bans: BanRegistry,
    protected_paths: Vec<String>,
}

impl AdmissionPipeline {
    pub fn new(config: &AdmissionConfig, clock: SharedClock) -> Self {
        Self::from_parts(
            RateBucketStore::new(config, clock.clone()),
            AnomalyDetector::new(config, clock.clone()),
            BanRegistry::new(config, clock),
        )
    }

    pub fn from_parts(
        buckets: RateBucketStore,
        anomalies: AnomalyDetector,
        bans: BanRegistry,
    ) -> Self {
        Self {
            buckets,
            anomalies,
            bans,
            protected_paths: DEFAULT_PROTECTED_PATHS
                .iter()
                .map(|path| path.to_string())
                .collect(),
        }
    }

    pub fn with_protected_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.protected_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.protected_paths.iter().any(|protected| protected == path)
    }

    /// Agent check, then ban check, then (protected paths only) anomaly
    /// recording and the token buckets. Stops at the first denial.
    pub fn admit(&self, request: &AdmissionRequest<'_>) -> Admission {
        let identity = request.identity;

        if is_suspicious_agent(request.user_agent) {
            warn!(
                "Suspicious user agent blocked - IP: {}, UA: {:?}",
                identity, request.user_agent
            );
            return Err(Denial::SuspiciousAgent);
        }

        if self.bans.is_banned(identity) {
            warn!("Banned IP attempted access - IP: {}", identity);
            return Err(Denial::Banned);
        }

        if self.is_protected(request.path) {
            if self.anomalies.record(identity) {
                self.bans.ban(identity);
            }

            if !self.buckets.try_consume(identity) {
                warn!("Rate limit exceeded - IP: {}, path: {}", identity, request.path);
                return Err(Denial::RateLimited);
            }
        }

        Ok(())
    }

    pub fn buckets(&self) -> &RateBucketStore {
        &self.buckets
    }

    pub fn anomalies(&self) -> &AnomalyDetector {
        &self.anomalies
    }

    pub fn bans(&self) -> &BanRegistry {
        &self.bans
    }

    pub fn sweep(&self) -> PipelineSweep {
        PipelineSweep {
            buckets: self.buckets.sweep(),
            counters: self.anomalies.sweep(),
            bans: self.bans.sweep(),
        }
    }
}
