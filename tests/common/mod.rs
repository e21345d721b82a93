// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::{body::Body, response::Response};
use fitbit_dashboard::config::Config;
use fitbit_dashboard::error::AppError;
use fitbit_dashboard::models::{Session, SessionUser, TokenPair};
use fitbit_dashboard::routes::create_router;
use fitbit_dashboard::services::session::sign_session_id;
use fitbit_dashboard::services::{FitbitClient, MemorySessionStore, SessionStore};
use fitbit_dashboard::AppState;
use std::sync::Arc;
use wiremock::MockServer;

/// Create a test app pointed at the real (never contacted) Fitbit URLs.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::test_default(), memory_store())
}

/// Create a test app from an explicit config and session backend.
#[allow(dead_code)]
pub fn create_test_app_with(
    config: Config,
    sessions: Arc<dyn SessionStore>,
) -> (axum::Router, Arc<AppState>) {
    let fitbit = FitbitClient::from_config(&config).expect("Failed to build Fitbit client");
    let state = Arc::new(AppState::new(config, fitbit, sessions));
    (create_router(state.clone()), state)
}

/// Config whose Fitbit API base URL is the given mock server.
#[allow(dead_code)]
pub fn mock_config(mock_server: &MockServer) -> Config {
    let mut config = Config::test_default();
    config.fitbit_api_url = mock_server.uri();
    config
}

/// Create a test app backed by a fresh wiremock Fitbit API.
#[allow(dead_code)]
pub async fn create_mock_app() -> (axum::Router, Arc<AppState>, MockServer) {
    let mock_server = MockServer::start().await;
    let (app, state) = create_test_app_with(mock_config(&mock_server), memory_store());
    (app, state, mock_server)
}

#[allow(dead_code)]
pub fn memory_store() -> Arc<dyn SessionStore> {
    Arc::new(MemorySessionStore::new(chrono::Duration::hours(24)))
}

#[allow(dead_code)]
pub fn test_user() -> SessionUser {
    SessionUser {
        external_id: "ABC123".to_string(),
        display_name: "Test Sleeper".to_string(),
    }
}

/// Token pair valid for an hour.
#[allow(dead_code)]
pub fn test_tokens(access_token: &str) -> TokenPair {
    TokenPair::from_grant(
        access_token.to_string(),
        "refresh-1".to_string(),
        3600,
        chrono::Utc::now(),
    )
}

/// Store a session and return its id plus a `Cookie` header value for it.
#[allow(dead_code)]
pub async fn seed_session(state: &AppState, tokens: TokenPair) -> (String, String) {
    let session_id = state
        .sessions
        .create(test_user(), tokens)
        .await
        .expect("Failed to create session");
    let signed = sign_session_id(&session_id, &state.config.session_secret)
        .expect("Failed to sign session id");
    (session_id, format!("fitbit_sid={signed}"))
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body was not JSON")
}

#[allow(dead_code)]
pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(axum::http::header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Session backend whose writes always fail.
#[allow(dead_code)]
pub struct FailingSessionStore;

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn create(&self, _user: SessionUser, _tokens: TokenPair) -> Result<String, AppError> {
        Err(AppError::SessionStore("store unavailable".to_string()))
    }

    async fn get(&self, _session_id: &str) -> Result<Option<Session>, AppError> {
        Ok(None)
    }

    async fn update_tokens(&self, _session_id: &str, _tokens: TokenPair) -> Result<(), AppError> {
        Err(AppError::SessionStore("store unavailable".to_string()))
    }

    async fn destroy(&self, _session_id: &str) -> Result<(), AppError> {
        Ok(())
    }
}
