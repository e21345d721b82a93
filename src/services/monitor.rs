// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Periodic sleep-data monitor.
//!
//! Polls today's sleep log on an interval, appends a [`SleepCheck`] to a
//! bounded JSON log file and overwrites a "latest snapshot" file with the
//! raw payload. Credentials are owned by the monitor value; a 401 triggers
//! one refresh and one replay of that poll.

use crate::config::{ConfigError, DEFAULT_FITBIT_API_URL, DEFAULT_FITBIT_AUTHORIZE_URL};
use crate::error::AppError;
use crate::models::{SleepCheck, TokenPair};
use crate::services::fitbit::{FitbitClient, Resource, DEFAULT_EXPIRES_IN_SECS};
use crate::time_utils::today_utc;
use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Entries kept in the check log.
pub const MAX_LOG_ENTRIES: usize = 1000;

const DEFAULT_INTERVAL_SECS: u64 = 300;
const DEFAULT_LOG_FILE: &str = "monitoring/sleep_monitor_log.json";
const DEFAULT_SNAPSHOT_FILE: &str = "data/latest_sleep_data.json";

/// Monitor configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub fitbit_client_id: String,
    pub fitbit_client_secret: String,
    pub fitbit_api_url: String,
    pub access_token: String,
    pub refresh_token: String,
    pub interval: Duration,
    pub log_file: PathBuf,
    pub snapshot_file: PathBuf,
}

impl MonitorConfig {
    /// Load monitor configuration from environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build monitor configuration from an arbitrary variable source.
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
            fitbit_client_secret: required("FITBIT_CLIENT_SECRET")?,
            fitbit_api_url: lookup("FITBIT_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_FITBIT_API_URL.to_string()),
            access_token: required("FITBIT_ACCESS_TOKEN")?,
            refresh_token: required("FITBIT_REFRESH_TOKEN")?,
            interval: Duration::from_secs(
                lookup("MONITOR_INTERVAL_SECS")
                    .and_then(|v| v.parse().ok())
                    .filter(|s| *s > 0)
                    .unwrap_or(DEFAULT_INTERVAL_SECS),
            ),
            log_file: lookup("MONITOR_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            snapshot_file: lookup("MONITOR_SNAPSHOT_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_FILE)),
        })
    }
}

/// Sleep poller with explicitly owned credentials.
pub struct SleepMonitor {
    client: FitbitClient,
    tokens: TokenPair,
    log_file: PathBuf,
    snapshot_file: PathBuf,
    max_entries: usize,
}

impl SleepMonitor {
    pub fn new(
        client: FitbitClient,
        tokens: TokenPair,
        log_file: PathBuf,
        snapshot_file: PathBuf,
    ) -> Self {
        Self {
            client,
            tokens,
            log_file,
            snapshot_file,
            max_entries: MAX_LOG_ENTRIES,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Result<Self, AppError> {
        let client = FitbitClient::new(
            config.fitbit_client_id.clone(),
            config.fitbit_client_secret.clone(),
        )?
        .with_base_urls(&config.fitbit_api_url, DEFAULT_FITBIT_AUTHORIZE_URL);

        // The real expiry is unknown; 401 handling covers a stale token.
        let tokens = TokenPair::from_grant(
            config.access_token.clone(),
            config.refresh_token.clone(),
            DEFAULT_EXPIRES_IN_SECS,
            Utc::now(),
        );

        Ok(Self::new(
            client,
            tokens,
            config.log_file.clone(),
            config.snapshot_file.clone(),
        ))
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Current credentials (rotated after a refresh).
    pub fn tokens(&self) -> &TokenPair {
        &self.tokens
    }

    /// Fetch the sleep log for `date`, refreshing and replaying once on 401.
    pub async fn fetch_sleep(&mut self, date: &str) -> Result<Value, AppError> {
        match self
            .client
            .get_resource(&self.tokens.access_token, Resource::Sleep, date)
            .await
        {
            Err(e) if e.is_unauthorized() => {
                tracing::info!("Access token expired, attempting to refresh");
                self.tokens = self.client.refresh_token(&self.tokens.refresh_token).await?;
                self.client
                    .get_resource(&self.tokens.access_token, Resource::Sleep, date)
                    .await
            }
            other => other,
        }
    }

    /// Poll once and persist the result.
    pub async fn check_once(&mut self, date: &str) -> anyhow::Result<SleepCheck> {
        let check = match self.fetch_sleep(date).await {
            Ok(payload) => {
                save_snapshot(&self.snapshot_file, &payload).await?;
                SleepCheck::from_payload(Utc::now(), &payload)
            }
            Err(e) => {
                tracing::error!(error = %e, date = %date, "Error checking sleep data");
                SleepCheck::failed(Utc::now(), e.to_string())
            }
        };

        append_check(&self.log_file, &check, self.max_entries).await?;

        tracing::info!(
            has_data = check.has_data,
            latest_sleep_end = check.latest_sleep_end.as_deref().unwrap_or(""),
            "Checked sleep data"
        );
        Ok(check)
    }

    /// Poll until interrupted with Ctrl-C.
    pub async fn run(mut self, interval: Duration) -> anyhow::Result<()> {
        if load_snapshot(&self.snapshot_file).await?.is_some() {
            tracing::info!(path = %self.snapshot_file.display(), "Previous sleep snapshot found");
        }

        tracing::info!(
            interval_secs = interval.as_secs(),
            "Starting Fitbit sleep data monitoring"
        );

        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_once(&today_utc()).await?;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Monitoring stopped");
                    return Ok(());
                }
            }
        }
    }
}

/// Append a check to the JSON log, keeping only the newest `max_entries`.
pub async fn append_check(path: &Path, check: &SleepCheck, max_entries: usize) -> anyhow::Result<()> {
    let mut log = load_log(path).await?;
    log.push(check.clone());
    if log.len() > max_entries {
        let excess = log.len() - max_entries;
        log.drain(..excess);
    }

    write_json(path, &log).await
}

/// Read the check log; a missing file is an empty log.
pub async fn load_log(path: &Path) -> anyhow::Result<Vec<SleepCheck>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("Corrupt monitor log {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Overwrite the latest-snapshot file.
pub async fn save_snapshot(path: &Path, payload: &Value) -> anyhow::Result<()> {
    write_json(path, payload).await
}

/// Read the latest snapshot, if one has been written.
pub async fn load_snapshot(path: &Path) -> anyhow::Result<Option<Value>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw).with_context(|| {
            format!("Corrupt sleep snapshot {}", path.display())
        })?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

async fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let body = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
