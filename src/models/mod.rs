// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod metrics;
pub mod session;
pub mod sleep;
pub mod user;

pub use metrics::{MetricsSnapshot, RateLimitInfo, ResourceResponse, SubResult};
pub use session::Session;
pub use sleep::SleepCheck;
pub use user::{SessionUser, TokenPair};
