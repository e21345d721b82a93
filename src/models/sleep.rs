// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sleep monitor check records.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One poll of the sleep endpoint, as appended to the monitor log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepCheck {
    pub timestamp: String,
    pub has_data: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_sleep_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SleepCheck {
    /// Summarize a `/sleep/date/{date}.json` payload.
    ///
    /// The latest sleep log is the one with the greatest `endTime`.
    pub fn from_payload(now: DateTime<Utc>, payload: &Value) -> Self {
        let latest = payload
            .get("sleep")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|log| log.get("endTime").and_then(Value::as_str))
            .filter_map(|end| parse_fitbit_time(end).map(|t| (t, end)))
            .max_by_key(|(t, _)| *t)
            .map(|(_, end)| end.to_string());

        Self {
            timestamp: now.to_rfc3339(),
            has_data: latest.is_some(),
            latest_sleep_end: latest,
            error: None,
        }
    }

    /// Record a failed poll.
    pub fn failed(now: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            timestamp: now.to_rfc3339(),
            has_data: false,
            latest_sleep_end: None,
            error: Some(error.into()),
        }
    }
}

/// Fitbit sleep timestamps are local time without offset, e.g. `2024-01-15T07:02:30.000`.
fn parse_fitbit_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_latest_sleep_end_picks_greatest_end_time() {
        let payload = json!({
            "sleep": [
                {"endTime": "2024-01-15T07:02:30.000"},
                {"endTime": "2024-01-15T14:45:00.000"},
                {"endTime": "2024-01-15T03:10:00.000"}
            ]
        });
        let check = SleepCheck::from_payload(Utc::now(), &payload);

        assert!(check.has_data);
        assert_eq!(
            check.latest_sleep_end.as_deref(),
            Some("2024-01-15T14:45:00.000")
        );
    }

    #[test]
    fn test_no_sleep_logs() {
        let check = SleepCheck::from_payload(Utc::now(), &json!({"sleep": []}));
        assert!(!check.has_data);
        assert!(check.latest_sleep_end.is_none());

        let check = SleepCheck::from_payload(Utc::now(), &json!({}));
        assert!(!check.has_data);
    }
}
