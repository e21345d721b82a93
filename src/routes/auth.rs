// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit OAuth login, callback, logout and session routes.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::{
    auth_hint_cookie, clear_auth_cookies, current_session, presented_session_id, session_cookie,
    AuthSession,
};
use crate::models::SessionUser;
use crate::AppState;

/// Routes that work without a session.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
        .route("/auth/session", get(session_status))
}

/// Routes that need a live session.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/logout", post(logout))
}

/// Why a callback did not produce a session; sent to the frontend as `?error=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    AccessDenied,
    NoCode,
    AuthFailed,
    ProfileError,
    SessionError,
}

impl LoginFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            LoginFailure::AccessDenied => "access_denied",
            LoginFailure::NoCode => "no_code",
            LoginFailure::AuthFailed => "auth_failed",
            LoginFailure::ProfileError => "profile_error",
            LoginFailure::SessionError => "session_error",
        }
    }
}

/// Start the OAuth flow by redirecting the browser to Fitbit.
async fn login(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let url = state
        .fitbit
        .authorization_url(&state.config.fitbit_redirect_uri)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    tracing::info!(
        client_id = %state.config.fitbit_client_id,
        "Starting OAuth flow, redirecting to Fitbit"
    );

    Ok(Redirect::temporary(&url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback: exchange the code, fetch the profile, start a session.
async fn callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    match complete_login(&state, params).await {
        Ok(session_id) => {
            // The prior session is dropped only once its replacement exists.
            let jar = match presented_session_id(&state, &jar) {
                Some(old_id) if old_id != session_id => {
                    if let Err(e) = state.sessions.destroy(&old_id).await {
                        tracing::warn!(error = %e, "Failed to discard prior session");
                    }
                    state.metrics.forget_session(&old_id);
                    clear_auth_cookies(&state.config, jar)
                }
                _ => jar,
            };

            match session_cookie(&state.config, &session_id) {
                Ok(cookie) => {
                    let jar = jar.add(cookie).add(auth_hint_cookie(&state.config));
                    let target = format!("{}/dashboard", state.config.frontend_url);
                    (jar, Redirect::temporary(&target)).into_response()
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to sign session cookie");
                    failure_redirect(&state, jar, LoginFailure::SessionError)
                }
            }
        }
        Err(reason) => failure_redirect(&state, jar, reason),
    }
}

async fn complete_login(
    state: &AppState,
    params: CallbackParams,
) -> std::result::Result<String, LoginFailure> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Fitbit");
        return Err(LoginFailure::AccessDenied);
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(LoginFailure::NoCode)?;

    tracing::info!("Exchanging authorization code for tokens");
    let tokens = state
        .fitbit
        .exchange_code(&code, &state.config.fitbit_redirect_uri)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Authorization code exchange failed");
            LoginFailure::AuthFailed
        })?;

    let user = state
        .fitbit
        .get_profile(&tokens.access_token)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Profile fetch failed after token exchange");
            LoginFailure::ProfileError
        })?;

    let session_id = state
        .sessions
        .create(user.clone(), tokens)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to persist session");
            LoginFailure::SessionError
        })?;

    tracing::info!(
        user_id = %user.external_id,
        display_name = %user.display_name,
        "OAuth successful, session created"
    );

    Ok(session_id)
}

fn failure_redirect(state: &AppState, jar: CookieJar, reason: LoginFailure) -> Response {
    let target = format!(
        "{}/login?error={}",
        state.config.frontend_url,
        reason.as_str()
    );
    (jar, Redirect::temporary(&target)).into_response()
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "frontend/src/generated/")
)]
pub struct LogoutResponse {
    pub message: String,
}

/// Destroy the session and clear both auth cookies.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<LogoutResponse>)> {
    state.sessions.destroy(&session.session_id).await?;
    state.metrics.forget_session(&session.session_id);

    tracing::info!(user_id = %session.user.external_id, "User logged out");

    Ok((
        clear_auth_cookies(&state.config, jar),
        Json(LogoutResponse {
            message: "Successfully logged out".to_string(),
        }),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "frontend/src/generated/")
)]
pub struct SessionStatusResponse {
    pub is_authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "binding-generation", ts(optional))]
    pub user: Option<SessionUser>,
}

/// Report whether the caller's cookie names a live session.
async fn session_status(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<SessionStatusResponse>> {
    let user = current_session(&state, &jar).await?.map(|s| s.user);
    Ok(Json(SessionStatusResponse {
        is_authenticated: user.is_some(),
        user,
    }))
}
