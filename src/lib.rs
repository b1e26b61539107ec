// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod admission;
pub mod api;
pub mod chat;
pub mod cli;
pub mod clock;
pub mod config;
pub mod monitoring;
pub mod version;

// Re-export main types
pub use admission::{
    AdmissionPipeline, AdmissionRequest, AnomalyDetector, BanRegistry, ChallengeStore, Denial,
    RateBucketStore, SessionQuotaManager, Sweeper,
};
pub use api::{create_app, AppState};
pub use chat::{ChatBackend, ChatError, OpenAiChatBackend};
pub use clock::{Clock, MockClock, SharedClock, SystemClock};
pub use config::{AdmissionConfig, ConfigError};
