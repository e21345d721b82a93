// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Standalone sleep-data monitor.
//!
//! Polls today's Fitbit sleep log on a fixed interval until Ctrl-C.

use fitbit_dashboard::{
    logging::init_logging,
    services::{MonitorConfig, SleepMonitor},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = MonitorConfig::from_env()?;
    tracing::info!(
        log_file = %config.log_file.display(),
        snapshot_file = %config.snapshot_file.display(),
        "Starting sleep monitor"
    );

    let monitor = SleepMonitor::from_config(&config)?;
    monitor.run(config.interval).await
}
