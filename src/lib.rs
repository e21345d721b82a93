// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Fitbit Dashboard: personal health metrics behind a Fitbit OAuth session
//!
//! This crate provides the backend API that signs a browser in with Fitbit,
//! keeps the resulting tokens in a server-side session, and proxies sleep,
//! activity and heart-rate data for the dashboard.

pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{FitbitClient, MetricsProxy, SessionStore};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub fitbit: FitbitClient,
    pub sessions: Arc<dyn SessionStore>,
    pub metrics: MetricsProxy,
}

impl AppState {
    /// Wire the services together around a session backend.
    pub fn new(config: Config, fitbit: FitbitClient, sessions: Arc<dyn SessionStore>) -> Self {
        let metrics = MetricsProxy::new(fitbit.clone(), sessions.clone());
        Self {
            config,
            fitbit,
            sessions,
            metrics,
        }
    }
}
