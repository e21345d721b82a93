// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side session storage and signed session cookies.
//!
//! The store is a trait so a durable backend can replace the in-memory map
//! without touching the handlers.

use crate::error::AppError;
use crate::models::{Session, SessionUser, TokenPair};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Bytes of entropy in a session id.
const SESSION_ID_BYTES: usize = 32;

/// Capability set every session backend provides.
///
/// Writes are last-writer-wins per session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session under a freshly generated id.
    async fn create(&self, user: SessionUser, tokens: TokenPair) -> Result<String, AppError>;

    /// Look up a live session, extending its rolling lifetime.
    async fn get(&self, session_id: &str) -> Result<Option<Session>, AppError>;

    /// Replace the token pair of an existing session.
    async fn update_tokens(&self, session_id: &str, tokens: TokenPair) -> Result<(), AppError>;

    /// Remove a session. Unknown ids are not an error.
    async fn destroy(&self, session_id: &str) -> Result<(), AppError>;
}

/// In-process session store backed by a concurrent map.
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
    rng: SystemRandom,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            rng: SystemRandom::new(),
        }
    }

    /// Drop every session idle for longer than the TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.last_seen > cutoff);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn generate_id(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::SessionStore("random generator failure".to_string()))?;
        Ok(hex::encode(bytes))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user: SessionUser, tokens: TokenPair) -> Result<String, AppError> {
        let session_id = self.generate_id()?;
        let now = Utc::now();

        self.sessions.insert(
            session_id.clone(),
            Session {
                session_id: session_id.clone(),
                user,
                tokens,
                created_at: now,
                last_seen: now,
            },
        );

        Ok(session_id)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, AppError> {
        let now = Utc::now();

        // The entry guard must be released before `remove`.
        match self.sessions.get_mut(session_id) {
            None => return Ok(None),
            Some(mut entry) if now - entry.last_seen <= self.ttl => {
                entry.last_seen = now;
                return Ok(Some(entry.value().clone()));
            }
            Some(_) => {}
        }

        self.sessions.remove(session_id);
        tracing::debug!("Session expired");
        Ok(None)
    }

    async fn update_tokens(&self, session_id: &str, tokens: TokenPair) -> Result<(), AppError> {
        match self.sessions.get_mut(session_id) {
            Some(mut entry) => {
                entry.tokens = tokens;
                Ok(())
            }
            None => Err(AppError::NotAuthenticated),
        }
    }

    async fn destroy(&self, session_id: &str) -> Result<(), AppError> {
        self.sessions.remove(session_id);
        Ok(())
    }
}

// ─── Cookie signing ──────────────────────────────────────────────────────────

/// Cookie value for a session: `session_id.hex(hmac_sha256(secret, session_id))`.
pub fn sign_session_id(session_id: &str, secret: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(session_id.as_bytes());
    Ok(format!(
        "{}.{}",
        session_id,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify a signed cookie value and return the session id it carries.
pub fn verify_session_cookie<'a>(value: &'a str, secret: &[u8]) -> Option<&'a str> {
    let (session_id, signature_hex) = value.rsplit_once('.')?;
    let signature = hex::decode(signature_hex).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(session_id.as_bytes());
    // Constant-time comparison.
    mac.verify_slice(&signature).ok()?;

    Some(session_id)
}
