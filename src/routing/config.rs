// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Feature-flag configuration, environment loading, and atomic snapshot
//! publication.
//!
//! Readers obtain an `Arc` snapshot that stays valid for the duration of a
//! decision; writers validate and publish a replacement snapshot atomically.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_NEW_PIPELINE_PCT: &str = "MIGRATION_NEW_PIPELINE_PCT";
pub const ENV_ENABLE_CANARY: &str = "MIGRATION_ENABLE_CANARY";
pub const ENV_CANARY_SAMPLE_PCT: &str = "MIGRATION_CANARY_SAMPLE_PCT";
pub const ENV_CIRCUIT_BREAKER: &str = "MIGRATION_CIRCUIT_BREAKER";
pub const ENV_AUTO_ROLLBACK: &str = "MIGRATION_AUTO_ROLLBACK";
pub const ENV_DETAILED_LOGGING: &str = "MIGRATION_DETAILED_LOGGING";
pub const ENV_NEW_PIPELINE_TABLES: &str = "MIGRATION_NEW_PIPELINE_TABLES";
pub const ENV_MANUAL_OVERRIDE: &str = "MIGRATION_MANUAL_OVERRIDE";
pub const ENV_ERROR_THRESHOLD: &str = "MIGRATION_ERROR_THRESHOLD";
pub const ENV_ERROR_WINDOW_SECONDS: &str = "MIGRATION_ERROR_WINDOW_SECONDS";
pub const ENV_RECOVERY_TIMEOUT_SECONDS: &str = "MIGRATION_RECOVERY_TIMEOUT_SECONDS";

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: expected {expected}, got \"{value}\"")]
    InvalidEnv {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{field} must be between 0 and 100, got {value}")]
    PercentageOutOfRange { field: &'static str, value: u8 },

    #[error("error_threshold must be a positive integer")]
    ZeroThreshold,

    #[error("{field} must be a positive duration")]
    ZeroDuration { field: &'static str },
}

/// Manual routing override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualOverride {
    #[default]
    None,
    ForceLegacy,
    ForceNew,
}

impl std::fmt::Display for ManualOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManualOverride::None => write!(f, "none"),
            ManualOverride::ForceLegacy => write!(f, "force_legacy"),
            ManualOverride::ForceNew => write!(f, "force_new"),
        }
    }
}

/// Migration feature flags.
///
/// Constructed once at startup from the environment plus programmatic
/// overrides; mutated only through [`ConfigHandle::update`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlagConfig {
    /// Percentage of traffic routed to the pipeline engine (0-100).
    pub new_pipeline_percentage: u8,
    /// Whether canary dual-execution is enabled.
    pub enable_canary: bool,
    /// Percentage of requests sampled for canary runs (0-100).
    pub canary_sample_rate: u8,
    /// Canary every eligible request regardless of the sample rate.
    pub force_canary_mode: bool,
    /// Tables always routed to the pipeline engine.
    /// BTreeSet keeps listing order deterministic.
    pub forced_new_tables: BTreeSet<String>,
    /// Manual routing override.
    pub manual_override: ManualOverride,
    /// Failures within the window required to trip the breaker.
    pub error_threshold: u32,
    /// Sliding window over which failures are counted.
    pub error_window: Duration,
    /// Open-state dwell time before a recovery probe is allowed.
    pub recovery_timeout: Duration,
    /// Whether the circuit breaker governs routing.
    pub circuit_breaker_enabled: bool,
    /// Whether a tripped breaker triggers automatic rollback.
    pub auto_rollback_enabled: bool,
    /// Emit per-discrepancy canary logs and debug-level routing detail.
    pub detailed_logging: bool,
}

impl Default for FeatureFlagConfig {
    fn default() -> Self {
        Self {
            new_pipeline_percentage: 0,
            enable_canary: false,
            canary_sample_rate: 100,
            force_canary_mode: false,
            forced_new_tables: BTreeSet::new(),
            manual_override: ManualOverride::None,
            error_threshold: 5,
            error_window: Duration::from_secs(300),
            recovery_timeout: Duration::from_secs(600),
            circuit_breaker_enabled: true,
            auto_rollback_enabled: false,
            detailed_logging: false,
        }
    }
}

impl FeatureFlagConfig {
    /// Load configuration from `MIGRATION_*` environment variables.
    ///
    /// Unset variables fall back to defaults; invalid values produce a
    /// [`ConfigError`] naming the variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = read_env(ENV_NEW_PIPELINE_PCT) {
            config.new_pipeline_percentage =
                parse_percentage(ENV_NEW_PIPELINE_PCT, &raw)?;
        }
        if let Some(raw) = read_env(ENV_ENABLE_CANARY) {
            config.enable_canary = parse_bool(ENV_ENABLE_CANARY, &raw)?;
        }
        if let Some(raw) = read_env(ENV_CANARY_SAMPLE_PCT) {
            config.canary_sample_rate = parse_percentage(ENV_CANARY_SAMPLE_PCT, &raw)?;
        }
        if let Some(raw) = read_env(ENV_CIRCUIT_BREAKER) {
            config.circuit_breaker_enabled = parse_bool(ENV_CIRCUIT_BREAKER, &raw)?;
        }
        if let Some(raw) = read_env(ENV_AUTO_ROLLBACK) {
            config.auto_rollback_enabled = parse_bool(ENV_AUTO_ROLLBACK, &raw)?;
        }
        if let Some(raw) = read_env(ENV_DETAILED_LOGGING) {
            config.detailed_logging = parse_bool(ENV_DETAILED_LOGGING, &raw)?;
        }
        if let Some(raw) = read_env(ENV_NEW_PIPELINE_TABLES) {
            config.forced_new_tables = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = read_env(ENV_MANUAL_OVERRIDE) {
            config.manual_override = match raw.trim() {
                "" => ManualOverride::None,
                "legacy" => ManualOverride::ForceLegacy,
                "new" => ManualOverride::ForceNew,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: ENV_MANUAL_OVERRIDE,
                        value: raw,
                        expected: "one of \"legacy\", \"new\", or empty",
                    })
                }
            };
        }
        if let Some(raw) = read_env(ENV_ERROR_THRESHOLD) {
            config.error_threshold = parse_positive(ENV_ERROR_THRESHOLD, &raw)?;
        }
        if let Some(raw) = read_env(ENV_ERROR_WINDOW_SECONDS) {
            config.error_window =
                Duration::from_secs(parse_positive(ENV_ERROR_WINDOW_SECONDS, &raw)? as u64);
        }
        if let Some(raw) = read_env(ENV_RECOVERY_TIMEOUT_SECONDS) {
            config.recovery_timeout =
                Duration::from_secs(parse_positive(ENV_RECOVERY_TIMEOUT_SECONDS, &raw)? as u64);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.new_pipeline_percentage > 100 {
            return Err(ConfigError::PercentageOutOfRange {
                field: "new_pipeline_percentage",
                value: self.new_pipeline_percentage,
            });
        }
        if self.canary_sample_rate > 100 {
            return Err(ConfigError::PercentageOutOfRange {
                field: "canary_sample_rate",
                value: self.canary_sample_rate,
            });
        }
        if self.error_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if self.error_window.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "error_window",
            });
        }
        if self.recovery_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "recovery_timeout",
            });
        }
        Ok(())
    }
}

fn read_env(var: &'static str) -> Option<String> {
    std::env::var(var).ok()
}

fn parse_percentage(var: &'static str, raw: &str) -> Result<u8, ConfigError> {
    let value: u8 = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: raw.to_string(),
        expected: "an integer between 0 and 100",
    })?;
    if value > 100 {
        return Err(ConfigError::InvalidEnv {
            var,
            value: raw.to_string(),
            expected: "an integer between 0 and 100",
        });
    }
    Ok(value)
}

fn parse_positive(var: &'static str, raw: &str) -> Result<u32, ConfigError> {
    let value: u32 = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: raw.to_string(),
        expected: "a positive integer",
    })?;
    if value == 0 {
        return Err(ConfigError::InvalidEnv {
            var,
            value: raw.to_string(),
            expected: "a positive integer",
        });
    }
    Ok(value)
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: raw.to_string(),
            expected: "a boolean (true/false)",
        }),
    }
}

/// Copy-on-write holder for the active configuration.
///
/// In-flight decisions keep the `Arc` they snapshotted; updates are
/// linearizable with respect to future decisions.
pub struct ConfigHandle {
    inner: RwLock<Arc<FeatureFlagConfig>>,
}

impl ConfigHandle {
    /// Wrap a validated configuration.
    pub fn new(config: FeatureFlagConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: RwLock::new(Arc::new(config)),
        })
    }

    /// Current configuration snapshot.
    pub fn snapshot(&self) -> Arc<FeatureFlagConfig> {
        Arc::clone(&self.inner.read())
    }

    /// Atomically replace the active configuration. Invalid values refuse
    /// the mutation and leave the previous snapshot in place.
    pub fn update(&self, config: FeatureFlagConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.inner.write() = Arc::new(config);
        Ok(())
    }

    /// Replace only the manual override, keeping all other flags.
    pub fn set_manual_override(&self, value: ManualOverride) {
        let mut guard = self.inner.write();
        let mut config = (**guard).clone();
        config.manual_override = value;
        *guard = Arc::new(config);
    }
}
