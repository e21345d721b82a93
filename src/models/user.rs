//! User identity and OAuth token models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Fitbit user as exposed to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "frontend/src/generated/")
)]
pub struct SessionUser {
    /// Fitbit encoded user id
    #[serde(rename = "id")]
    pub external_id: String,
    /// Display name from the Fitbit profile
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// User's OAuth tokens (held server-side only).
///
/// A pair is never mutated in place: refresh produces a new value that
/// replaces the old one in the session.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Bearer token for Fitbit API calls
    pub access_token: String,
    /// Long-lived token for minting new access tokens
    pub refresh_token: String,
    /// Issue time plus the provider's `expires_in`
    pub expires_at: DateTime<Utc>,
}

impl TokenPair {
    /// Build a pair from a token grant issued at `issued_at`.
    pub fn from_grant(
        access_token: String,
        refresh_token: String,
        expires_in_secs: i64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: issued_at + Duration::seconds(expires_in_secs),
        }
    }

    /// True once the access token's lifetime has elapsed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// Tokens must never end up in logs.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
