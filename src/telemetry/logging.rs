// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for host processes.

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber.
///
/// `detailed` lowers the default filter to debug, matching the
/// `MIGRATION_DETAILED_LOGGING` flag. `RUST_LOG` takes precedence when set.
/// Calling this more than once is a no-op.
pub fn init_logging(detailed: bool) {
    let default_filter = if detailed { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
