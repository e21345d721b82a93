// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sleep monitor tests against a mocked Fitbit API.

use fitbit_dashboard::config::DEFAULT_FITBIT_AUTHORIZE_URL;
use fitbit_dashboard::models::TokenPair;
use fitbit_dashboard::services::monitor::{load_log, load_snapshot};
use fitbit_dashboard::services::{FitbitClient, SleepMonitor};
use serde_json::json;
use std::path::PathBuf;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DATE: &str = "2024-01-15";
const SLEEP_PATH: &str = "/1.2/user/-/sleep/date/2024-01-15.json";

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "fitbit-monitor-test-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn monitor_for(mock_server: &MockServer, dir: &std::path::Path) -> SleepMonitor {
    let client = FitbitClient::new("test_client_id".to_string(), "test_secret".to_string())
        .unwrap()
        .with_base_urls(&mock_server.uri(), DEFAULT_FITBIT_AUTHORIZE_URL);
    let tokens = TokenPair::from_grant(
        "access-1".to_string(),
        "refresh-1".to_string(),
        3600,
        chrono::Utc::now(),
    );
    SleepMonitor::new(
        client,
        tokens,
        dir.join("monitoring/sleep_monitor_log.json"),
        dir.join("data/latest_sleep_data.json"),
    )
}

#[tokio::test]
async fn test_check_refreshes_once_and_records_latest_sleep() {
    let mock_server = MockServer::start().await;
    let dir = scratch_dir("refresh");

    Mock::given(method("GET"))
        .and(path(SLEEP_PATH))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "expires_in": 28800
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(SLEEP_PATH))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sleep": [
                {"endTime": "2024-01-15T03:00:00.000"},
                {"endTime": "2024-01-15T07:02:30.000"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut monitor = monitor_for(&mock_server, &dir);
    let check = monitor.check_once(DATE).await.unwrap();

    assert!(check.has_data);
    assert_eq!(check.latest_sleep_end.as_deref(), Some("2024-01-15T07:02:30.000"));
    assert_eq!(monitor.tokens().access_token, "access-2");
    // No rotated refresh token in the grant: the old one is kept.
    assert_eq!(monitor.tokens().refresh_token, "refresh-1");

    let log = load_log(&dir.join("monitoring/sleep_monitor_log.json"))
        .await
        .unwrap();
    assert_eq!(log, vec![check]);

    let snapshot = load_snapshot(&dir.join("data/latest_sleep_data.json"))
        .await
        .unwrap()
        .expect("snapshot written");
    assert_eq!(snapshot["sleep"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_check_is_logged_without_snapshot() {
    let mock_server = MockServer::start().await;
    let dir = scratch_dir("failure");

    Mock::given(method("GET"))
        .and(path(SLEEP_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut monitor = monitor_for(&mock_server, &dir);
    let check = monitor.check_once(DATE).await.unwrap();

    assert!(!check.has_data);
    assert!(check.error.is_some());
    assert_eq!(
        load_log(&dir.join("monitoring/sleep_monitor_log.json"))
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(load_snapshot(&dir.join("data/latest_sleep_data.json"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_log_keeps_newest_entries() {
    let mock_server = MockServer::start().await;
    let dir = scratch_dir("trim");

    Mock::given(method("GET"))
        .and(path(SLEEP_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sleep": []})))
        .mount(&mock_server)
        .await;

    let mut monitor = monitor_for(&mock_server, &dir).with_max_entries(2);
    for _ in 0..4 {
        monitor.check_once(DATE).await.unwrap();
    }

    let log = load_log(&dir.join("monitoring/sleep_monitor_log.json"))
        .await
        .unwrap();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|c| !c.has_data));
}
