// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request admission control: per-IP rate limiting, automatic bans,
//! per-session conversation quotas and human-verification challenges.

pub mod anomaly;
pub mod ban;
pub mod challenge;
pub mod decision;
pub mod identity;
pub mod pipeline;
pub mod rate_bucket;
pub mod session_quota;
pub mod store;
pub mod sweeper;

pub use anomaly::{AnomalyDetector, MinuteCounter};
pub use ban::BanRegistry;
pub use challenge::{ChallengeFailure, ChallengeStore, IssuedChallenge};
pub use decision::{Admission, Denial};
pub use identity::client_identity;
pub use pipeline::{is_suspicious_agent, AdmissionPipeline, AdmissionRequest};
pub use rate_bucket::{BucketSnapshot, RateBucketStore, TokenBucket};
pub use session_quota::{SessionQuota, SessionQuotaManager, TurnReservation};
pub use store::{MemoryStore, StateStore};
pub use sweeper::{SweepReport, Sweeper};
