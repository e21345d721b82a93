// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit Dashboard API Server
//!
//! Signs the browser in with Fitbit and proxies per-date sleep, activity
//! and heart-rate data to the dashboard frontend.

use fitbit_dashboard::{
    config::Config,
    logging::init_logging,
    services::{FitbitClient, MemorySessionStore},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;

/// How often idle sessions are swept from memory.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration, refusing to start");
            return Err(e.into());
        }
    };
    tracing::info!(port = config.port, "Starting Fitbit Dashboard API");

    let fitbit = FitbitClient::from_config(&config)?;

    let sessions = Arc::new(MemorySessionStore::new(chrono::Duration::hours(
        config.session_ttl_hours,
    )));
    tracing::info!(
        ttl_hours = config.session_ttl_hours,
        "In-memory session store initialized"
    );

    let state = Arc::new(AppState::new(config.clone(), fitbit, sessions.clone()));

    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = sessions.purge_expired();
            let locks = sweeper.metrics.prune_refresh_locks();
            if removed > 0 || locks > 0 {
                tracing::debug!(removed, locks, "Purged expired sessions");
            }
        }
    });

    let app = fitbit_dashboard::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
