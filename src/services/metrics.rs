// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session-aware metrics proxy.
//!
//! Every proxied request is allowed exactly one token refresh: either
//! up front when the stored access token has already expired, or after
//! the first 401 from Fitbit, in which case the rejected call is replayed
//! once. A second 401 is final.

use crate::error::AppError;
use crate::models::{MetricsSnapshot, Session, SubResult, TokenPair};
use crate::services::fitbit::{FitbitClient, Resource};
use crate::services::session::SessionStore;
use crate::time_utils::{format_utc_rfc3339, validate_date};
use chrono::Utc;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-session mutex serializing refreshes.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Credentials used for the duration of one proxied request.
struct RequestCredentials {
    session_id: String,
    tokens: TokenPair,
    refreshed: bool,
}

/// Proxies per-date Fitbit resources on behalf of a session.
#[derive(Clone)]
pub struct MetricsProxy {
    client: FitbitClient,
    sessions: Arc<dyn SessionStore>,
    refresh_locks: RefreshLocks,
}

impl MetricsProxy {
    pub fn new(client: FitbitClient, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            client,
            sessions,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    /// Drop per-session bookkeeping after logout.
    pub fn forget_session(&self, session_id: &str) {
        self.refresh_locks.remove(session_id);
    }

    /// Drop refresh locks no request currently holds. Returns how many were removed.
    ///
    /// Clones are only taken under the map's shard lock, so an entry with a
    /// single reference cannot be in use.
    pub fn prune_refresh_locks(&self) -> usize {
        let before = self.refresh_locks.len();
        self.refresh_locks
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.refresh_locks.len())
    }

    /// Fetch a single resource for `date`, refreshing the token at most once.
    pub async fn fetch_resource(
        &self,
        session: &Session,
        resource: Resource,
        date: &str,
    ) -> Result<Value, AppError> {
        validate_date(date)?;
        let mut creds = self.credentials_for(session).await?;

        match self
            .client
            .get_resource(&creds.tokens.access_token, resource, date)
            .await
        {
            Err(e) if e.is_unauthorized() && !creds.refreshed => {
                tracing::info!(path = %resource.path(date), "Access token rejected, refreshing once");
                self.refresh(&mut creds).await?;
                self.client
                    .get_resource(&creds.tokens.access_token, resource, date)
                    .await
            }
            other => other,
        }
    }

    /// Fetch sleep, activity, heart-rate summary and intraday concurrently.
    ///
    /// All four branches always run to completion; a failing branch is
    /// reported under its own key instead of failing the aggregate.
    pub async fn get_metrics(
        &self,
        session: &Session,
        date: &str,
    ) -> Result<MetricsSnapshot, AppError> {
        validate_date(date)?;
        let mut creds = self.credentials_for(session).await?;

        let mut outcomes = fetch_all(&self.client, &creds.tokens.access_token, date).await;

        if !creds.refreshed && outcomes.iter().any(|o| matches!(o, Err(e) if e.is_unauthorized()))
        {
            tracing::info!(date = %date, "Access token rejected during fan-out, refreshing once");
            match self.refresh(&mut creds).await {
                Ok(()) => {
                    outcomes =
                        replay_unauthorized(&self.client, &creds.tokens.access_token, date, outcomes)
                            .await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Token refresh failed; reporting rejected branches");
                }
            }
        }

        let [sleep, activity, heart_rate, intraday] = outcomes;
        log_outcome(Resource::Sleep, &sleep);
        log_outcome(Resource::Activity, &activity);
        log_outcome(Resource::HeartRate, &heart_rate);
        log_outcome(Resource::HeartRateIntraday, &intraday);

        Ok(MetricsSnapshot {
            status: "success",
            fetch_time: format_utc_rfc3339(Utc::now()),
            requested_date: date.to_string(),
            sleep: settle(Resource::Sleep, sleep),
            activity: settle(Resource::Activity, activity),
            heart_rate: merge_heart_rate(heart_rate, intraday),
        })
    }

    /// Start-of-request credentials; an already-expired token is refreshed here.
    async fn credentials_for(&self, session: &Session) -> Result<RequestCredentials, AppError> {
        let mut creds = RequestCredentials {
            session_id: session.session_id.clone(),
            tokens: session.tokens.clone(),
            refreshed: false,
        };

        if creds.tokens.is_expired(Utc::now()) {
            tracing::info!("Access token expired, refreshing before request");
            self.refresh(&mut creds).await?;
        }

        Ok(creds)
    }

    /// Refresh the session's tokens, consuming this request's single refresh.
    async fn refresh(&self, creds: &mut RequestCredentials) -> Result<(), AppError> {
        creds.refreshed = true;

        let lock = self
            .refresh_locks
            .entry(creds.session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another request may have refreshed while we waited for the lock.
        let current = self
            .sessions
            .get(&creds.session_id)
            .await?
            .ok_or(AppError::NotAuthenticated)?;
        if current.tokens.access_token != creds.tokens.access_token
            && !current.tokens.is_expired(Utc::now())
        {
            tracing::debug!("Using token refreshed by a concurrent request");
            creds.tokens = current.tokens;
            return Ok(());
        }

        let new_tokens = self.client.refresh_token(&current.tokens.refresh_token).await?;
        self.sessions
            .update_tokens(&creds.session_id, new_tokens.clone())
            .await?;
        creds.tokens = new_tokens;

        Ok(())
    }
}

type Outcome = Result<Value, AppError>;

/// Settle-all join over the four metric resources.
async fn fetch_all(client: &FitbitClient, access_token: &str, date: &str) -> [Outcome; 4] {
    let (sleep, activity, heart_rate, intraday) = tokio::join!(
        client.get_resource(access_token, Resource::Sleep, date),
        client.get_resource(access_token, Resource::Activity, date),
        client.get_resource(access_token, Resource::HeartRate, date),
        client.get_resource(access_token, Resource::HeartRateIntraday, date),
    );
    [sleep, activity, heart_rate, intraday]
}

/// Replay only the branches Fitbit rejected with 401, concurrently.
async fn replay_unauthorized(
    client: &FitbitClient,
    access_token: &str,
    date: &str,
    outcomes: [Outcome; 4],
) -> [Outcome; 4] {
    let [sleep, activity, heart_rate, intraday] = outcomes;
    let (sleep, activity, heart_rate, intraday) = tokio::join!(
        replay_if_unauthorized(client, access_token, Resource::Sleep, date, sleep),
        replay_if_unauthorized(client, access_token, Resource::Activity, date, activity),
        replay_if_unauthorized(client, access_token, Resource::HeartRate, date, heart_rate),
        replay_if_unauthorized(client, access_token, Resource::HeartRateIntraday, date, intraday),
    );
    [sleep, activity, heart_rate, intraday]
}

async fn replay_if_unauthorized(
    client: &FitbitClient,
    access_token: &str,
    resource: Resource,
    date: &str,
    previous: Outcome,
) -> Outcome {
    match previous {
        Err(e) if e.is_unauthorized() => client.get_resource(access_token, resource, date).await,
        settled => settled,
    }
}

fn failure_reason(resource: Resource, error: &AppError) -> String {
    format!("Failed to get {}: {}", resource.label(), error)
}

fn settle(resource: Resource, outcome: Outcome) -> SubResult {
    match outcome {
        Ok(value) => SubResult::Fetched(value),
        Err(e) => SubResult::Failed {
            error: failure_reason(resource, &e),
        },
    }
}

/// Merge the heart-rate summary with the intraday series.
///
/// Intraday keys overlay the summary. A failed intraday fetch is dropped
/// silently; a failed summary leaves its `error` key in place.
fn merge_heart_rate(summary: Outcome, intraday: Outcome) -> SubResult {
    let intraday = match intraday {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    };

    let mut merged = match summary {
        Ok(Value::Object(map)) => map,
        Ok(other) => return SubResult::Fetched(other),
        Err(e) => match intraday {
            None => {
                return SubResult::Failed {
                    error: failure_reason(Resource::HeartRate, &e),
                }
            }
            Some(_) => {
                let mut map = Map::new();
                map.insert(
                    "error".to_string(),
                    Value::String(failure_reason(Resource::HeartRate, &e)),
                );
                map
            }
        },
    };

    if let Some(intraday) = intraday {
        merged.extend(intraday);
    }
    SubResult::Fetched(Value::Object(merged))
}

fn log_outcome(resource: Resource, outcome: &Outcome) {
    match outcome {
        Ok(value) => {
            let keys: Vec<&str> = value
                .as_object()
                .map(|m| m.keys().map(String::as_str).collect())
                .unwrap_or_default();
            tracing::debug!(keys = ?keys, "Fetched {}", resource.label());
        }
        Err(e) => {
            tracing::warn!(error = %e, tag = e.tag(), "Failed to fetch {}", resource.label());
        }
    }
}
