// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Telemetry for the migration control plane.
//!
//! Metrics use the `metrics` facade - no network exporters included.

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{
    init_metrics, record_breaker_transition, record_canary_run, record_canary_timeout,
    record_engine_latency, record_request, record_rollback,
};
