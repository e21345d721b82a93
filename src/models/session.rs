// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side session record.

use super::{SessionUser, TokenPair};
use chrono::{DateTime, Utc};

/// Session bound to a browser cookie.
#[derive(Debug, Clone)]
pub struct Session {
    /// Random identifier carried (signed) in the session cookie
    pub session_id: String,
    pub user: SessionUser,
    pub tokens: TokenPair,
    pub created_at: DateTime<Utc>,
    /// Last successful lookup; drives the rolling TTL
    pub last_seen: DateTime<Utc>,
}
