// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session cookie authentication middleware.

use crate::config::{Config, AUTH_HINT_COOKIE, SESSION_COOKIE};
use crate::error::AppError;
use crate::models::Session;
use crate::services::session::{sign_session_id, verify_session_cookie};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

/// Authenticated session extracted from the session cookie.
#[derive(Debug, Clone)]
pub struct AuthSession(pub Session);

/// Middleware that requires a live session.
///
/// The session cookie is re-issued on every authenticated response so its
/// lifetime rolls with activity, unless the handler already set cookies.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = current_session(&state, &jar)
        .await?
        .ok_or(AppError::NotAuthenticated)?;

    let renewed = session_cookie(&state.config, &session.session_id)?;
    request.extensions_mut().insert(AuthSession(session));

    let mut response = next.run(request).await;
    if !response.headers().contains_key(header::SET_COOKIE) {
        if let Ok(value) = HeaderValue::from_str(&renewed.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    Ok(response)
}

/// Resolve the session named by the request's cookie, if any.
pub async fn current_session(
    state: &AppState,
    jar: &CookieJar,
) -> Result<Option<Session>, AppError> {
    let Some(session_id) = presented_session_id(state, jar) else {
        return Ok(None);
    };
    state.sessions.get(session_id.as_str()).await
}

/// Session id from a correctly signed cookie, without consulting the store.
pub fn presented_session_id(state: &AppState, jar: &CookieJar) -> Option<String> {
    let cookie = jar.get(SESSION_COOKIE)?;
    match verify_session_cookie(cookie.value(), &state.config.session_secret) {
        Some(id) => Some(id.to_string()),
        None => {
            tracing::warn!("Rejected session cookie with bad signature");
            None
        }
    }
}

fn session_cookie_base(config: &Config, value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies())
        .build()
}

fn auth_hint_cookie_base(config: &Config, value: &'static str) -> Cookie<'static> {
    Cookie::build((AUTH_HINT_COOKIE, value))
        .path("/")
        .http_only(false)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies())
        .build()
}

fn session_max_age(config: &Config) -> time::Duration {
    time::Duration::hours(config.session_ttl_hours)
}

/// HTTP-only cookie carrying the signed session id.
pub fn session_cookie(config: &Config, session_id: &str) -> Result<Cookie<'static>, AppError> {
    let mut cookie = session_cookie_base(config, sign_session_id(session_id, &config.session_secret)?);
    cookie.set_max_age(session_max_age(config));
    Ok(cookie)
}

/// Script-readable `fitbit_auth=success` cookie prompting the frontend to re-poll.
pub fn auth_hint_cookie(config: &Config) -> Cookie<'static> {
    let mut cookie = auth_hint_cookie_base(config, "success");
    cookie.set_max_age(session_max_age(config));
    cookie
}

/// Remove both auth cookies with attributes matching their creation.
pub fn clear_auth_cookies(config: &Config, jar: CookieJar) -> CookieJar {
    jar.remove(session_cookie_base(config, String::new()))
        .remove(auth_hint_cookie_base(config, ""))
}
