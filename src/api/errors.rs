// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::admission::Denial;

/// JSON body of every refused or failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: bool,
    pub message: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_expired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_count: Option<u32>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    Denied(Denial),
    InvalidRequest(String),
    Upstream(String),
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let status = self.status_code();
        let message = match self {
            ApiError::Denied(denial) => denial.to_string(),
            ApiError::InvalidRequest(msg) => msg.clone(),
            ApiError::Upstream(_) => "Chat service is unavailable, please try again".to_string(),
            ApiError::InternalError(msg) => msg.clone(),
        };

        let quota_exceeded = matches!(self, ApiError::Denied(Denial::QuotaExceeded { .. }));
        ErrorResponse {
            error: true,
            message,
            status,
            session_expired: quota_exceeded.then_some(true),
            remaining_count: quota_exceeded.then_some(0),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Denied(denial) => denial.status_code(),
            ApiError::InvalidRequest(_) => 400,
            ApiError::Upstream(_) => 502,
            ApiError::InternalError(_) => 500,
        }
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        ApiError::Denied(denial)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Denied(denial) => write!(f, "Denied: {}", denial),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}
