// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::errors::ApiError;
use super::http_server::AppState;
use crate::admission::{Denial, IssuedChallenge};
use crate::config::AdmissionConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    pub remaining_count: u32,
    pub used_count: u32,
    pub max_count: u32,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResetReply {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemainingReply {
    pub remaining: u32,
    pub total: u32,
}

/// Loosely typed so a missing or non-integer field yields `valid: false`
/// instead of an extractor rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub answer: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifyReply {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Session id from the configured header; `None` when absent, empty or not
/// valid UTF-8.
pub fn session_id_from(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let session_id = session_id_from(&headers, &state.session_header)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(
        "Chat request - session: {}, message length: {}",
        session_id,
        request.message.len()
    );

    if request.message.trim().is_empty() {
        return Err(ApiError::InvalidRequest(
            "message must not be empty".to_string(),
        ));
    }

    let max_count = state.quotas.max_conversations();
    let Some(turn) = state.quotas.begin_turn(&session_id) else {
        warn!("Session quota exhausted - session: {}", session_id);
        let denial = Denial::QuotaExceeded { max: max_count };
        state.metrics.record_denial(&denial);
        return Err(denial.into());
    };

    // Quota is only consumed once the backend produced a reply
    let response = match state.chat.chat(&session_id, &request.message).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Chat backend failed - session: {}, error: {}", session_id, e);
            state.metrics.record_chat_failure();
            return Err(ApiError::Upstream(e.to_string()));
        }
    };

    let used_count = turn.complete();
    let remaining_count = max_count.saturating_sub(used_count);
    state.metrics.record_chat_turn();
    info!(
        "Session {} used {}/{} conversations, {} remaining",
        session_id, used_count, max_count, remaining_count
    );

    Ok(Json(ChatReply {
        response,
        remaining_count,
        used_count,
        max_count,
        session_id,
    }))
}

pub async fn reset_session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<ResetReply> {
    if let Some(session_id) = session_id_from(&headers, &state.session_header) {
        state.quotas.reset(&session_id);
        state.chat.clear_history(&session_id).await;
        info!("Session reset: {}", session_id);
    }

    Json(ResetReply {
        success: true,
        message: "Session has been reset".to_string(),
    })
}

pub async fn remaining_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<RemainingReply> {
    let total = state.quotas.max_conversations();
    let remaining = match session_id_from(&headers, &state.session_header) {
        Some(session_id) => state.quotas.remaining_count(&session_id),
        None => total,
    };
    Json(RemainingReply { remaining, total })
}

pub async fn health_handler() -> &'static str {
    "OK"
}

pub async fn version_handler() -> Json<serde_json::Value> {
    Json(crate::version::get_version_info())
}

pub async fn config_handler(State(state): State<Arc<AppState>>) -> Json<AdmissionConfig> {
    Json(state.config.clone())
}

pub async fn challenge_handler(State(state): State<Arc<AppState>>) -> Json<IssuedChallenge> {
    let challenge = state.challenges.issue();
    state.metrics.record_challenge_issued();
    Json(challenge)
}

pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Json<VerifyReply> {
    let token = request.token.filter(|token| !token.is_empty());
    let answer = request.answer.as_ref().and_then(serde_json::Value::as_i64);

    let (Some(token), Some(answer)) = (token, answer) else {
        return Json(VerifyReply {
            valid: false,
            message: Some("token and numeric answer are required".to_string()),
        });
    };

    let valid = match state.challenges.verify(&token, answer) {
        Ok(()) => true,
        Err(failure) => {
            let denial = Denial::from(failure);
            info!("Challenge rejected: {}", denial);
            false
        }
    };
    state.metrics.record_challenge_verified(valid);

    Json(VerifyReply {
        valid,
        message: None,
    })
}

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.set_store_sizes(state.store_sizes());
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => ApiError::InternalError(format!("failed to render metrics: {}", e))
            .into_response(),
    }
}
