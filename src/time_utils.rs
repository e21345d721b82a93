// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and request date validation.

use crate::error::AppError;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Today's date in UTC as `YYYY-MM-DD`.
pub fn today_utc() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Validate a `date` query parameter, defaulting to today when absent or empty.
///
/// The value must be exactly `\d{4}-\d{2}-\d{2}` and name a real calendar day.
pub fn resolve_request_date(raw: Option<&str>) -> Result<String, AppError> {
    match raw {
        None | Some("") => Ok(today_utc()),
        Some(date) => validate_date(date).map(str::to_string),
    }
}

/// Check that `date` is a well-formed `YYYY-MM-DD` calendar date.
pub fn validate_date(date: &str) -> Result<&str, AppError> {
    let bytes = date.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });

    if shape_ok && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok() {
        Ok(date)
    } else {
        Err(AppError::InvalidDate(date.to_string()))
    }
}
