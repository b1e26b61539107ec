// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the chat admission gateway

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2025-11-24";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "dual-window-rate-limiting",
    "anomaly-auto-ban",
    "session-quotas",
    "arithmetic-challenge",
    "agent-denylist",
    "forwarded-client-identity",
    "background-sweeper",
    "prometheus-metrics",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Chat Admission Gateway {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info for API responses
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
