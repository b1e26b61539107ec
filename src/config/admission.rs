// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Admission limits: defaults, TOML file and environment overrides.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_MAX_CONVERSATIONS_PER_SESSION: &str = "ADMISSION_MAX_CONVERSATIONS_PER_SESSION";
pub const ENV_MAX_REQUESTS_PER_MINUTE: &str = "ADMISSION_MAX_REQUESTS_PER_MINUTE";
pub const ENV_MAX_REQUESTS_PER_HOUR: &str = "ADMISSION_MAX_REQUESTS_PER_HOUR";
pub const ENV_BAN_THRESHOLD: &str = "ADMISSION_BAN_THRESHOLD";
pub const ENV_BAN_DURATION_MINUTES: &str = "ADMISSION_BAN_DURATION_MINUTES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {var} has invalid value {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Immutable admission limits handed to every component constructor.
///
/// Serialized in camelCase for the read-only `/api/config` endpoint; the TOML
/// file accepts either camelCase or snake_case keys under `[admission]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdmissionConfig {
    #[serde(alias = "max_conversations_per_session")]
    pub max_conversations_per_session: u32,
    #[serde(alias = "max_requests_per_minute")]
    pub max_requests_per_minute: u32,
    #[serde(alias = "max_requests_per_hour")]
    pub max_requests_per_hour: u32,
    #[serde(alias = "ban_threshold")]
    pub ban_threshold: u32,
    #[serde(alias = "ban_duration_minutes")]
    pub ban_duration_minutes: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_conversations_per_session: 10,
            max_requests_per_minute: 20,
            max_requests_per_hour: 100,
            ban_threshold: 50,
            ban_duration_minutes: 60,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    admission: AdmissionConfig,
}

impl AdmissionConfig {
    /// Defaults, then the optional TOML file, then environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load the `[admission]` table from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.admission)
    }

    /// Apply `ADMISSION_*` environment variables on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| env::var(var).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let fields: [(&'static str, &mut u32); 5] = [
            (
                ENV_MAX_CONVERSATIONS_PER_SESSION,
                &mut self.max_conversations_per_session,
            ),
            (ENV_MAX_REQUESTS_PER_MINUTE, &mut self.max_requests_per_minute),
            (ENV_MAX_REQUESTS_PER_HOUR, &mut self.max_requests_per_hour),
            (ENV_BAN_THRESHOLD, &mut self.ban_threshold),
            (ENV_BAN_DURATION_MINUTES, &mut self.ban_duration_minutes),
        ];

        for (var, field) in fields {
            if let Some(value) = lookup(var) {
                *field = value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnv { var, value })?;
            }
        }
        Ok(self)
    }

    /// Reject limits that would deny every request or never expire.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.max_conversations_per_session, "maxConversationsPerSession"),
            (self.max_requests_per_minute, "maxRequestsPerMinute"),
            (self.max_requests_per_hour, "maxRequestsPerHour"),
            (self.ban_threshold, "banThreshold"),
            (self.ban_duration_minutes, "banDurationMinutes"),
        ];
        for (value, name) in checks {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn ban_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.ban_duration_minutes) * 60)
    }
}
