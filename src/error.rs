// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::models::RateLimitInfo;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid date format: {0:?} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Fitbit rejected the authorization request: {0}")]
    UpstreamAuth(String),

    #[error("Fitbit rejected the access token for {path}")]
    UpstreamUnauthorized { path: String },

    #[error("Fitbit rate limit exceeded")]
    UpstreamRateLimit(RateLimitInfo),

    #[error("Fitbit API returned HTTP {status} for {path}")]
    UpstreamServer { status: u16, path: String },

    #[error("Fitbit API request failed: {0}")]
    Upstream(String),

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the upstream rejected the bearer token (HTTP 401).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::UpstreamUnauthorized { .. })
    }

    /// Short machine-readable tag used in JSON bodies and logs.
    pub fn tag(&self) -> &'static str {
        match self {
            AppError::InvalidDate(_) => "invalid_date",
            AppError::NotAuthenticated => "not_authenticated",
            AppError::UpstreamAuth(_) => "upstream_auth",
            AppError::UpstreamUnauthorized { .. } => "upstream_unauthorized",
            AppError::UpstreamRateLimit(_) => "rate_limited",
            AppError::UpstreamServer { .. } => "upstream_error",
            AppError::Upstream(_) => "upstream_unavailable",
            AppError::SessionStore(_) => "session_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidDate(_) => StatusCode::BAD_REQUEST,
            AppError::NotAuthenticated
            | AppError::UpstreamAuth(_)
            | AppError::UpstreamUnauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::UpstreamRateLimit(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::UpstreamServer { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::SessionStore(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Upstream HTTP status, when the error originated from a Fitbit response.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AppError::UpstreamUnauthorized { .. } => Some(401),
            AppError::UpstreamRateLimit(_) => Some(429),
            AppError::UpstreamServer { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message safe to show to the browser.
    pub fn public_message(&self) -> String {
        match self {
            AppError::SessionStore(_) | AppError::Internal(_) => {
                "Something went wrong".to_string()
            }
            AppError::UpstreamAuth(_) => "Fitbit authorization failed".to_string(),
            other => other.to_string(),
        }
    }

    /// Build the JSON error body, optionally tagged with the requested date.
    pub fn to_body(&self, date: Option<&str>) -> ErrorResponse {
        ErrorResponse {
            status: "error",
            error: self.tag(),
            message: self.public_message(),
            date: date.map(str::to_string),
            upstream_status: self.upstream_status(),
            rate_limit: match self {
                AppError::UpstreamRateLimit(info) => Some(info.clone()),
                _ => None,
            },
            timestamp: crate::time_utils::format_utc_rfc3339(chrono::Utc::now()),
        }
    }

    fn log(&self) {
        match self {
            AppError::SessionStore(msg) => {
                tracing::error!(error = %msg, "Session store error");
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
            }
            _ => {}
        }
    }
}

/// JSON error response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status: &'static str,
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitInfo>,
    pub timestamp: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        (status, Json(self.to_body(None))).into_response()
    }
}

/// An [`AppError`] raised while serving a specific date.
#[derive(Debug)]
pub struct DatedError {
    pub error: AppError,
    pub date: String,
}

impl IntoResponse for DatedError {
    fn into_response(self) -> Response {
        self.error.log();
        let status = self.error.status_code();
        (status, Json(self.error.to_body(Some(&self.date)))).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
