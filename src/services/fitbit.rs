// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit Web API client.
//!
//! Handles:
//! - Authorization URL construction
//! - Code-for-token exchange and token refresh (HTTP Basic client auth)
//! - Profile and per-date metric fetches
//! - Rate limit detection (429 with `fitbit-rate-limit-*` headers)

use crate::config::{Config, ConfigError, DEFAULT_FITBIT_API_URL, DEFAULT_FITBIT_AUTHORIZE_URL};
use crate::error::AppError;
use crate::models::{RateLimitInfo, SessionUser, TokenPair};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{HeaderMap, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Scopes requested when the caller does not ask for specific ones.
pub const DEFAULT_SCOPES: &[&str] = &["sleep", "profile", "activity", "heartrate"];

/// Requested authorization lifetime (7 days).
const AUTHORIZATION_EXPIRES_IN: u32 = 604_800;

/// Per-request timeout for every upstream call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fitbit's default access token lifetime, used when `expires_in` is missing.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 28_800;

/// Retry-After value reported when Fitbit omits the header.
const DEFAULT_RETRY_AFTER: &str = "60";

/// Build the Fitbit authorization URL the browser is sent to.
pub fn build_authorization_url(
    authorize_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[&str],
) -> Result<String, ConfigError> {
    if client_id.is_empty() {
        return Err(ConfigError::Invalid("client_id must not be empty".into()));
    }
    if redirect_uri.is_empty() {
        return Err(ConfigError::Invalid("redirect_uri must not be empty".into()));
    }

    let scopes = if scopes.is_empty() {
        DEFAULT_SCOPES
    } else {
        scopes
    };

    Ok(format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&expires_in={}",
        authorize_url,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes.join(" ")),
        AUTHORIZATION_EXPIRES_IN,
    ))
}

/// Reduce a redirect URI to scheme, authority and path.
///
/// Fitbit compares the exchange's `redirect_uri` byte-for-byte with the one
/// from the authorization request, so query and fragment must never leak in.
pub fn canonical_redirect_uri(uri: &str) -> &str {
    let end = uri.find(['?', '#']).unwrap_or(uri.len());
    &uri[..end]
}

/// Read rate limit metadata from a 429 response.
pub fn rate_limit_from_headers(headers: &HeaderMap) -> RateLimitInfo {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    RateLimitInfo {
        retry_after: header("retry-after").unwrap_or_else(|| DEFAULT_RETRY_AFTER.to_string()),
        limit: header("fitbit-rate-limit-limit"),
        remaining: header("fitbit-rate-limit-remaining"),
        reset: header("fitbit-rate-limit-reset"),
    }
}

/// Per-date Fitbit resources proxied to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Sleep,
    Activity,
    HeartRate,
    HeartRateIntraday,
}

impl Resource {
    /// API path for the given (already validated) date.
    pub fn path(self, date: &str) -> String {
        match self {
            Resource::Sleep => format!("/1.2/user/-/sleep/date/{date}.json"),
            Resource::Activity => format!("/1/user/-/activities/date/{date}.json"),
            Resource::HeartRate => format!("/1/user/-/activities/heart/date/{date}/1d.json"),
            Resource::HeartRateIntraday => {
                format!("/1/user/-/activities/heart/date/{date}/1d/1min.json")
            }
        }
    }

    /// Human-readable label used in failure reasons.
    pub fn label(self) -> &'static str {
        match self {
            Resource::Sleep => "sleep data",
            Resource::Activity => "activity data",
            Resource::HeartRate => "heart rate data",
            Resource::HeartRateIntraday => "intraday heart rate data",
        }
    }
}

/// Fitbit API client.
#[derive(Clone)]
pub struct FitbitClient {
    http: reqwest::Client,
    api_url: String,
    authorize_url: String,
    client_id: String,
    client_secret: String,
}

impl FitbitClient {
    /// Create a new Fitbit client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            api_url: DEFAULT_FITBIT_API_URL.to_string(),
            authorize_url: DEFAULT_FITBIT_AUTHORIZE_URL.to_string(),
            client_id,
            client_secret,
        })
    }

    /// Create a client from application config, honoring base URL overrides.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Ok(Self::new(
            config.fitbit_client_id.clone(),
            config.fitbit_client_secret.clone(),
        )?
        .with_base_urls(&config.fitbit_api_url, &config.fitbit_authorize_url))
    }

    /// Point the client at different API and authorize endpoints.
    pub fn with_base_urls(mut self, api_url: &str, authorize_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self.authorize_url = authorize_url.to_string();
        self
    }

    /// Authorization URL for this client with the default scopes.
    pub fn authorization_url(&self, redirect_uri: &str) -> Result<String, ConfigError> {
        build_authorization_url(
            &self.authorize_url,
            &self.client_id,
            canonical_redirect_uri(redirect_uri),
            &[],
        )
    }

    // ─── Token endpoint ──────────────────────────────────────────────────────

    /// Exchange an authorization code for a token pair.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenPair, AppError> {
        let grant = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", canonical_redirect_uri(redirect_uri)),
            ])
            .await?;

        let refresh_token = grant.refresh_token.unwrap_or_else(|| {
            tracing::warn!("Fitbit token exchange returned no refresh token");
            String::new()
        });

        Ok(TokenPair::from_grant(
            grant.access_token,
            refresh_token,
            grant.expires_in,
            chrono::Utc::now(),
        ))
    }

    /// Mint a new token pair from a refresh token.
    ///
    /// Fitbit may omit the new refresh token; the prior one is kept then.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let grant = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;

        tracing::info!(
            rotated = grant.refresh_token.is_some(),
            "Fitbit access token refreshed"
        );

        Ok(TokenPair::from_grant(
            grant.access_token,
            grant
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
            grant.expires_in,
            chrono::Utc::now(),
        ))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, AppError> {
        let basic = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .http
            .post(format!("{}/oauth2/token", self.api_url))
            .header(AUTHORIZATION, format!("Basic {}", basic))
            .form(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Fitbit token request failed");
                AppError::UpstreamAuth(format!("Token request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // Provider body is for server logs only.
            tracing::error!(status = %status, body = %body, "Fitbit token endpoint rejected request");
            return Err(AppError::UpstreamAuth(format!(
                "Token endpoint returned {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::UpstreamAuth(format!("Failed to parse token response: {}", e)))
    }

    // ─── Resource endpoints ──────────────────────────────────────────────────

    /// Get the authenticated user's profile.
    pub async fn get_profile(&self, access_token: &str) -> Result<SessionUser, AppError> {
        let profile: ProfileResponse = self
            .get_json("/1/user/-/profile.json", access_token)
            .await?;

        Ok(SessionUser {
            external_id: profile.user.encoded_id,
            display_name: profile.user.display_name,
        })
    }

    /// Fetch one per-date resource as raw JSON.
    pub async fn get_resource(
        &self,
        access_token: &str,
        resource: Resource,
        date: &str,
    ) -> Result<Value, AppError> {
        let path = resource.path(date);
        self.get_json(&path, access_token).await.map_err(|e| {
            tracing::warn!(
                path = %path,
                date = %date,
                status = ?e.upstream_status(),
                error = %e,
                "Failed to get {}",
                resource.label()
            );
            e
        })
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(format!("{}{}", self.api_url, path))
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, "en_US")
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        self.check_response_json(response, path).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
        path: &str,
    ) -> Result<T, AppError> {
        let status = response.status();

        if status.as_u16() == 429 {
            let info = rate_limit_from_headers(response.headers());
            tracing::warn!(
                path = %path,
                retry_after = %info.retry_after,
                "Fitbit rate limit hit (429)"
            );
            return Err(AppError::UpstreamRateLimit(info));
        }

        // Unauthorized - token may be expired
        if status.as_u16() == 401 {
            return Err(AppError::UpstreamUnauthorized {
                path: path.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, path = %path, body = %body, "Fitbit API error");
            return Err(AppError::UpstreamServer {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("JSON parse error: {}", e)))
    }
}

/// Token grant from `/oauth2/token`.
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN_SECS
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    user: ProfileUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUser {
    encoded_id: String,
    display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_authorization_url_contains_required_params() {
        let url = build_authorization_url(
            DEFAULT_FITBIT_AUTHORIZE_URL,
            "abc",
            "https://x/y",
            DEFAULT_SCOPES,
        )
        .unwrap();

        assert!(url.starts_with("https://www.fitbit.com/oauth2/authorize?"));
        assert!(url.contains("client_id=abc"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fx%2Fy"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=sleep%20profile%20activity%20heartrate"));
    }

    #[test]
    fn test_authorization_url_empty_scopes_use_defaults() {
        let url =
            build_authorization_url(DEFAULT_FITBIT_AUTHORIZE_URL, "abc", "https://x/y", &[])
                .unwrap();
        assert!(url.contains("scope=sleep%20profile%20activity%20heartrate"));
    }

    #[test]
    fn test_authorization_url_rejects_empty_inputs() {
        assert!(matches!(
            build_authorization_url(DEFAULT_FITBIT_AUTHORIZE_URL, "", "https://x/y", &[]),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            build_authorization_url(DEFAULT_FITBIT_AUTHORIZE_URL, "abc", "", &[]),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_canonical_redirect_uri() {
        assert_eq!(
            canonical_redirect_uri("https://api.example.com/api/auth/callback?code=1#x"),
            "https://api.example.com/api/auth/callback"
        );
        assert_eq!(
            canonical_redirect_uri("http://localhost:5001/api/auth/callback"),
            "http://localhost:5001/api/auth/callback"
        );
    }

    #[test]
    fn test_rate_limit_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("120"));
        headers.insert("fitbit-rate-limit-limit", HeaderValue::from_static("150"));
        headers.insert("fitbit-rate-limit-remaining", HeaderValue::from_static("0"));
        headers.insert("fitbit-rate-limit-reset", HeaderValue::from_static("1800"));

        let info = rate_limit_from_headers(&headers);
        assert_eq!(info.retry_after, "120");
        assert_eq!(info.limit.as_deref(), Some("150"));
        assert_eq!(info.remaining.as_deref(), Some("0"));
        assert_eq!(info.reset.as_deref(), Some("1800"));
    }

    #[test]
    fn test_rate_limit_retry_after_defaults_to_60() {
        let info = rate_limit_from_headers(&HeaderMap::new());
        assert_eq!(info.retry_after, "60");
        assert!(info.limit.is_none());
    }

    #[test]
    fn test_resource_paths() {
        assert_eq!(
            Resource::Sleep.path("2024-01-15"),
            "/1.2/user/-/sleep/date/2024-01-15.json"
        );
        assert_eq!(
            Resource::HeartRateIntraday.path("2024-01-15"),
            "/1/user/-/activities/heart/date/2024-01-15/1d/1min.json"
        );
    }
}
