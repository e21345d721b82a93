// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Metrics payloads assembled for the dashboard.
//!
//! Fitbit payloads are passed through as raw JSON; only the envelope is typed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Retry metadata from a Fitbit 429 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "frontend/src/generated/")
)]
pub struct RateLimitInfo {
    /// Seconds to wait; "60" when the header is absent
    pub retry_after: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<String>,
}

/// Outcome of one branch of the metrics fan-out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubResult {
    Fetched(Value),
    Failed { error: String },
}

impl SubResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, SubResult::Failed { .. })
    }
}

/// Per-date aggregate returned by `/api/fitbit/metrics`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub status: &'static str,
    pub fetch_time: String,
    pub requested_date: String,
    pub sleep: SubResult,
    pub activity: SubResult,
    /// Summary merged with the intraday series when available
    pub heart_rate: SubResult,
}

/// Envelope for single-resource proxy responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceResponse {
    pub status: &'static str,
    pub fetch_time: String,
    pub requested_date: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_branch_serializes_as_error_object() {
        let failed = SubResult::Failed {
            error: "Failed to get sleep data".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"error": "Failed to get sleep data"})
        );
    }

    #[test]
    fn test_resource_response_flattens_payload() {
        let payload = json!({"summary": {"steps": 1234}});
        let response = ResourceResponse {
            status: "success",
            fetch_time: "2024-01-15T08:00:00Z".to_string(),
            requested_date: "2024-01-15".to_string(),
            payload: payload.as_object().cloned().unwrap(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["summary"]["steps"], 1234);
        assert_eq!(value["requestedDate"], "2024-01-15");
    }
}
