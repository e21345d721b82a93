// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use fitbit_dashboard::error::{AppError, DatedError};

#[test]
fn test_is_unauthorized_matches_only_upstream_401() {
    let err = AppError::UpstreamUnauthorized {
        path: "/1/user/-/profile.json".to_string(),
    };
    assert!(err.is_unauthorized());

    assert!(!AppError::NotAuthenticated.is_unauthorized());
    assert!(!AppError::UpstreamAuth("invalid_grant".to_string()).is_unauthorized());
    assert!(!AppError::UpstreamServer {
        status: 500,
        path: "/x".to_string()
    }
    .is_unauthorized());
}

#[test]
fn test_status_and_tag_mapping() {
    let cases = [
        (AppError::InvalidDate("x".into()), StatusCode::BAD_REQUEST, "invalid_date"),
        (AppError::NotAuthenticated, StatusCode::UNAUTHORIZED, "not_authenticated"),
        (AppError::Upstream("timeout".into()), StatusCode::BAD_GATEWAY, "upstream_unavailable"),
        (
            AppError::SessionStore("down".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
            "session_error",
        ),
    ];

    for (err, status, tag) in cases {
        assert_eq!(err.status_code(), status, "{err}");
        assert_eq!(err.tag(), tag);
    }
}

#[test]
fn test_internal_details_are_not_exposed() {
    let err = AppError::SessionStore("connection refused to 10.0.0.5".to_string());
    let body = err.to_body(None);
    assert!(!body.message.contains("10.0.0.5"));
}

#[test]
fn test_dated_error_response_status() {
    let response = DatedError {
        error: AppError::InvalidDate("2024-13-45".to_string()),
        date: "2024-13-45".to_string(),
    }
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
