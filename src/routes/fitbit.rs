// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit data proxy routes.

use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, DatedError, Result};
use crate::middleware::AuthSession;
use crate::models::{MetricsSnapshot, ResourceResponse};
use crate::services::Resource;
use crate::time_utils::{format_utc_rfc3339, resolve_request_date};
use crate::AppState;

/// Routes that work without a session.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/fitbit/auth-url", get(auth_url))
}

/// Routes that need a live session.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/fitbit/sleep", get(get_sleep))
        .route("/fitbit/activity", get(get_activity))
        .route("/fitbit/heart-rate", get(get_heart_rate))
        .route("/fitbit/metrics", get(get_metrics))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "frontend/src/generated/")
)]
pub struct AuthUrlResponse {
    pub url: String,
}

/// Authorization URL for clients that start the flow themselves.
async fn auth_url(State(state): State<Arc<AppState>>) -> Result<Json<AuthUrlResponse>> {
    let url = state
        .fitbit
        .authorization_url(&state.config.fitbit_redirect_uri)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    Ok(Json(AuthUrlResponse { url }))
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    #[serde(default)]
    date: Option<String>,
}

fn requested_date(query: &DateQuery) -> std::result::Result<String, DatedError> {
    resolve_request_date(query.date.as_deref()).map_err(|error| DatedError {
        date: query.date.clone().unwrap_or_default(),
        error,
    })
}

async fn proxy_resource(
    state: &AppState,
    session: &AuthSession,
    resource: Resource,
    query: &DateQuery,
) -> std::result::Result<Json<ResourceResponse>, DatedError> {
    let date = requested_date(query)?;

    match state.metrics.fetch_resource(&session.0, resource, &date).await {
        Ok(payload) => Ok(Json(ResourceResponse {
            status: "success",
            fetch_time: format_utc_rfc3339(Utc::now()),
            requested_date: date,
            payload: into_object(payload),
        })),
        Err(error) => {
            tracing::warn!(
                path = %resource.path(&date),
                date = %date,
                status = ?error.upstream_status(),
                error = %error,
                "Fitbit proxy request failed"
            );
            Err(DatedError { error, date })
        }
    }
}

/// Fitbit resources are JSON objects; anything else is nested under `data`.
fn into_object(payload: Value) -> Map<String, Value> {
    match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    }
}

async fn get_sleep(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<DateQuery>,
) -> std::result::Result<Json<ResourceResponse>, DatedError> {
    proxy_resource(&state, &session, Resource::Sleep, &query).await
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<DateQuery>,
) -> std::result::Result<Json<ResourceResponse>, DatedError> {
    proxy_resource(&state, &session, Resource::Activity, &query).await
}

async fn get_heart_rate(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<DateQuery>,
) -> std::result::Result<Json<ResourceResponse>, DatedError> {
    proxy_resource(&state, &session, Resource::HeartRate, &query).await
}

/// Aggregate of all resources for one date; partial failures stay 200.
async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Query(query): Query<DateQuery>,
) -> std::result::Result<Json<MetricsSnapshot>, DatedError> {
    let date = requested_date(&query)?;

    let snapshot = state
        .metrics
        .get_metrics(&session, &date)
        .await
        .map_err(|error| DatedError {
            error,
            date: date.clone(),
        })?;

    Ok(Json(snapshot))
}
