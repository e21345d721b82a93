// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod fitbit;
pub mod metrics;
pub mod monitor;
pub mod session;

pub use fitbit::{FitbitClient, Resource};
pub use metrics::MetricsProxy;
pub use monitor::{MonitorConfig, SleepMonitor};
pub use session::{MemorySessionStore, SessionStore};
