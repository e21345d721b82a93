// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! All provider credentials are read once at startup. The process refuses
//! to start if any required variable is absent.

use std::env;

/// Default Fitbit Web API base URL.
pub const DEFAULT_FITBIT_API_URL: &str = "https://api.fitbit.com";

/// Default Fitbit authorization page.
pub const DEFAULT_FITBIT_AUTHORIZE_URL: &str = "https://www.fitbit.com/oauth2/authorize";

/// Name of the HTTP-only cookie carrying the signed session id.
pub const SESSION_COOKIE: &str = "fitbit_sid";

/// Name of the script-readable cookie that tells the frontend to re-poll.
pub const AUTH_HINT_COOKIE: &str = "fitbit_auth";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Provider (non-sensitive) ---
    /// Fitbit OAuth client ID (public)
    pub fitbit_client_id: String,
    /// Redirect URI registered with Fitbit; used verbatim for both the
    /// authorization request and the code exchange.
    pub fitbit_redirect_uri: String,
    /// Fitbit Web API base URL
    pub fitbit_api_url: String,
    /// Fitbit authorization page URL
    pub fitbit_authorize_url: String,

    // --- Frontend / server ---
    /// Frontend origin for CORS and post-login redirects
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Rolling session lifetime in hours
    pub session_ttl_hours: i64,

    // --- Secrets ---
    /// Fitbit OAuth client secret
    pub fitbit_client_secret: String,
    /// Key used to sign session cookies (raw bytes)
    pub session_secret: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        Ok(Self {
            fitbit_client_id: required("FITBIT_CLIENT_ID")?,
            fitbit_redirect_uri: required("FITBIT_REDIRECT_URI")?,
            fitbit_api_url: lookup("FITBIT_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_FITBIT_API_URL.to_string()),
            fitbit_authorize_url: lookup("FITBIT_AUTHORIZE_URL")
                .unwrap_or_else(|| DEFAULT_FITBIT_AUTHORIZE_URL.to_string()),
            frontend_url: required("FRONTEND_URL")?
                .trim_end_matches('/')
                .to_string(),
            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5001),
            session_ttl_hours: lookup("SESSION_TTL_HOURS")
                .and_then(|v| v.parse().ok())
                .filter(|h| *h > 0)
                .unwrap_or(24),
            fitbit_client_secret: required("FITBIT_CLIENT_SECRET")?,
            session_secret: required("SESSION_SECRET")?.into_bytes(),
        })
    }

    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            fitbit_client_id: "test_client_id".to_string(),
            fitbit_redirect_uri: "http://localhost:5001/api/auth/callback".to_string(),
            fitbit_api_url: DEFAULT_FITBIT_API_URL.to_string(),
            fitbit_authorize_url: DEFAULT_FITBIT_AUTHORIZE_URL.to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            port: 5001,
            session_ttl_hours: 24,
            fitbit_client_secret: "test_secret".to_string(),
            session_secret: b"test_session_secret_32_bytes!!!!".to_vec(),
        }
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.frontend_url.starts_with("https://")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    fn full() -> HashMap<&'static str, String> {
        vars(&[
            ("FITBIT_CLIENT_ID", "abc"),
            ("FITBIT_CLIENT_SECRET", " shh \n"),
            ("FITBIT_REDIRECT_URI", "https://api.example.com/api/auth/callback"),
            ("FRONTEND_URL", "https://dash.example.com/"),
            ("SESSION_SECRET", "session-secret"),
        ])
    }

    #[test]
    fn test_config_from_lookup() {
        let env = full();
        let config = Config::from_lookup(|k| env.get(k).cloned()).expect("Config should load");

        assert_eq!(config.fitbit_client_id, "abc");
        assert_eq!(config.fitbit_client_secret, "shh");
        assert_eq!(config.frontend_url, "https://dash.example.com");
        assert_eq!(config.port, 5001);
        assert_eq!(config.session_ttl_hours, 24);
        assert_eq!(config.fitbit_api_url, DEFAULT_FITBIT_API_URL);
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_config_refuses_missing_variables() {
        for name in [
            "FITBIT_CLIENT_ID",
            "FITBIT_CLIENT_SECRET",
            "FITBIT_REDIRECT_URI",
            "FRONTEND_URL",
            "SESSION_SECRET",
        ] {
            let mut env = full();
            env.remove(name);
            let err = Config::from_lookup(|k| env.get(k).cloned()).unwrap_err();
            assert!(matches!(err, ConfigError::Missing(n) if n == name));
        }
    }

    #[test]
    fn test_config_blank_value_counts_as_missing() {
        let mut env = full();
        env.insert("SESSION_SECRET", "   ".to_string());
        let err = Config::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SESSION_SECRET")));
    }

    #[test]
    fn test_config_optional_overrides() {
        let mut env = full();
        env.insert("PORT", "8080".to_string());
        env.insert("SESSION_TTL_HOURS", "2".to_string());
        env.insert("FITBIT_API_URL", "http://127.0.0.1:9999/".to_string());
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.session_ttl_hours, 2);
        assert_eq!(config.fitbit_api_url, "http://127.0.0.1:9999");
    }
}
