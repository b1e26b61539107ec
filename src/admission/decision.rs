// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use thiserror::Error;

use super::challenge::ChallengeFailure;

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("Access denied")]
    SuspiciousAgent,

    #[error("Your IP has been temporarily banned, please try again later")]
    Banned,

    #[error("Too many requests, please try again later")]
    RateLimited,

    #[error("This session has used all {max} conversations, please start a new session")]
    QuotaExceeded { max: u32 },

    #[error("Challenge verification failed: {0}")]
    ChallengeInvalid(#[from] ChallengeFailure),
}

impl Denial {
    pub fn status_code(&self) -> u16 {
        match self {
            Denial::SuspiciousAgent => 403,
            Denial::Banned | Denial::RateLimited | Denial::QuotaExceeded { .. } => 429,
            Denial::ChallengeInvalid(_) => 400,
        }
    }

    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Denial::SuspiciousAgent => "suspicious_agent",
            Denial::Banned => "banned",
            Denial::RateLimited => "rate_limited",
            Denial::QuotaExceeded { .. } => "quota_exceeded",
            Denial::ChallengeInvalid(_) => "challenge_invalid",
        }
    }
}

/// Outcome of running a request through the admission pipeline.
pub type Admission = Result<(), Denial>;
