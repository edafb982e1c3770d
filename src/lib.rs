// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Strangler-fig migration control plane for the TypeScript model
//! generation pipeline.
//!
//! Two generation engines exist: a mature legacy engine and a newly
//! engineered pipeline engine. This crate decides, per invocation, which
//! engine serves a request, observes both engines in parallel when desired,
//! detects output divergence, isolates a failing engine with a circuit
//! breaker, and exposes manual and automatic rollback to a safe baseline.
//!
//! # Components
//!
//! - [`routing::FlagRouter`]: percentage split, overrides, forced tables,
//!   canary sampling; day-sticky per-key decisions
//! - [`breaker::CircuitBreaker`]: sliding-window failure isolation
//! - [`comparison::OutputComparator`]: canary output diffing with tolerances
//! - [`rollback::RollbackManager`]: persistent rollback state machine
//! - [`adapter::MigrationAdapter`]: request orchestration
//!
//! A single [`MigrationController`] instance is constructed at startup and
//! injected into call sites; tests construct independent instances. There
//! is no hidden global state.

pub mod adapter;
pub mod breaker;
pub mod clock;
pub mod comparison;
pub mod engine;
pub mod rollback;
pub mod routing;
pub mod state;
pub mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use adapter::{AdapterConfig, MigrationAdapter, PerformanceSummary, PerformanceTracker};
use breaker::{BreakerPhase, CircuitBreaker};
use clock::{Clock, SystemClock};
use comparison::{ComparisonConfig, OutputComparator};
use engine::{EngineError, EngineKind, GenerationEngine, GenerationRequest, GenerationResult};
use rollback::{
    Notifier, RollbackManager, RollbackPhase, RollbackStateHandle, RollbackValidation,
};
use routing::{ConfigError, ConfigHandle, FeatureFlagConfig, FlagRouter, RoutingDecision};
use state::{StateError, StateStore};

/// Controller construction errors.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Top-level configuration for the migration controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Routing feature flags.
    pub flags: FeatureFlagConfig,
    /// Canary comparison tolerances.
    pub comparison: ComparisonConfig,
    /// Adapter execution options.
    pub adapter: AdapterConfig,
    /// Snapshot persistence path.
    pub state_path: PathBuf,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            flags: FeatureFlagConfig::default(),
            comparison: ComparisonConfig::default(),
            adapter: AdapterConfig::default(),
            state_path: StateStore::default_path(),
        }
    }
}

impl ControllerConfig {
    /// Build from `MIGRATION_*` environment variables, with defaults for
    /// everything the environment does not cover.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            flags: FeatureFlagConfig::from_env()?,
            ..Self::default()
        })
    }
}

/// Structured reply from management operations. Management APIs never raise.
#[derive(Debug, Clone, Serialize)]
pub struct ManagementReply {
    pub success: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ManagementReply {
    fn ok(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            reason: reason.into(),
            details: None,
        }
    }

    fn ok_with(reason: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            success: true,
            reason: reason.into(),
            details: Some(details),
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
            details: None,
        }
    }
}

/// Condensed configuration view for `status()`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub new_pipeline_percentage: u8,
    pub enable_canary: bool,
    pub canary_sample_rate: u8,
    pub forced_new_tables: Vec<String>,
    pub manual_override: routing::ManualOverride,
    pub circuit_breaker_enabled: bool,
    pub auto_rollback_enabled: bool,
    pub detailed_logging: bool,
}

/// Point-in-time controller status.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub config_summary: ConfigSummary,
    pub breaker_phase: BreakerPhase,
    pub rollback_phase: RollbackPhase,
    pub rollback_count_today: usize,
    pub performance_summary: PerformanceSummary,
}

/// Component health states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Failed,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Degraded => write!(f, "degraded"),
            HealthState::Failed => write!(f, "failed"),
        }
    }
}

/// Health of one component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub state: HealthState,
    pub detail: String,
}

/// Full health report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall: HealthState,
    pub components: Vec<ComponentHealth>,
}

/// The migration controller: wiring and management facade.
pub struct MigrationController {
    config: Arc<ConfigHandle>,
    clock: Arc<dyn Clock>,
    breaker: Arc<CircuitBreaker>,
    router: Arc<FlagRouter>,
    rollback_state: Arc<RollbackStateHandle>,
    rollback: Arc<RollbackManager>,
    store: Arc<StateStore>,
    samples: Arc<PerformanceTracker>,
    adapter: MigrationAdapter,
}

impl MigrationController {
    /// Construct with the system clock and no notifier.
    pub fn new(
        config: ControllerConfig,
        legacy_engine: Arc<dyn GenerationEngine>,
        new_engine: Arc<dyn GenerationEngine>,
    ) -> Result<Self, ControllerError> {
        Self::with_parts(
            config,
            legacy_engine,
            new_engine,
            Arc::new(SystemClock),
            None,
        )
    }

    /// Construct with an injected clock and notification callback.
    pub fn with_parts(
        config: ControllerConfig,
        legacy_engine: Arc<dyn GenerationEngine>,
        new_engine: Arc<dyn GenerationEngine>,
        clock: Arc<dyn Clock>,
        notifier: Option<Notifier>,
    ) -> Result<Self, ControllerError> {
        let config_handle = Arc::new(ConfigHandle::new(config.flags)?);
        let breaker = Arc::new(CircuitBreaker::new(config_handle.clone(), clock.clone()));
        let rollback_state = Arc::new(RollbackStateHandle::default());
        let store = Arc::new(StateStore::new(config.state_path));

        // Rehydrate persisted state. Missing or corrupt files yield
        // defaults; only a newer schema version aborts startup.
        let snapshot = store.load()?;
        breaker.restore(snapshot.breaker_phase, snapshot.breaker_opened_at);
        rollback_state.restore(
            snapshot.rollback_phase,
            snapshot.rollback_history,
            clock.now(),
        );
        if snapshot.rollback_phase == RollbackPhase::RolledBack {
            // The override is not persisted; re-derive it from the phase so
            // restarts keep all traffic on the legacy engine.
            config_handle.set_manual_override(routing::ManualOverride::ForceLegacy);
            info!("restored rolled_back state; manual override forced to legacy");
        }

        let rollback = Arc::new(RollbackManager::new(
            rollback_state.clone(),
            config_handle.clone(),
            breaker.clone(),
            store.clone(),
            clock.clone(),
            notifier,
        ));
        let router = Arc::new(FlagRouter::new(
            config_handle.clone(),
            breaker.clone(),
            rollback_state.clone(),
            clock.clone(),
        ));
        let comparator = Arc::new(OutputComparator::new(config.comparison));
        let samples = Arc::new(PerformanceTracker::new());
        let adapter = MigrationAdapter::new(
            router.clone(),
            legacy_engine,
            new_engine,
            comparator,
            breaker.clone(),
            rollback.clone(),
            samples.clone(),
            config_handle.clone(),
            config.adapter,
            clock.clone(),
        );

        Ok(Self {
            config: config_handle,
            clock,
            breaker,
            router,
            rollback_state,
            rollback,
            store,
            samples,
            adapter,
        })
    }

    /// Serve one generation request through the migration control plane.
    pub fn execute(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, EngineError> {
        self.adapter.execute(request)
    }

    /// Routing decision for a request, without executing anything.
    pub fn decide(&self, request: &GenerationRequest) -> RoutingDecision {
        self.router.decide(request)
    }

    /// Atomically replace the routing flags.
    pub fn update_config(&self, flags: FeatureFlagConfig) -> Result<(), ConfigError> {
        self.config.update(flags)
    }

    /// Current flag snapshot.
    pub fn config_snapshot(&self) -> Arc<FeatureFlagConfig> {
        self.config.snapshot()
    }

    /// The rollback manager, for planned rollbacks and recovery flows.
    pub fn rollback(&self) -> &RollbackManager {
        &self.rollback
    }

    /// Point-in-time status snapshot.
    pub fn status(&self) -> ControllerStatus {
        let flags = self.config.snapshot();
        let today = self.clock.now().date_naive();
        let rollback_count_today = self
            .rollback_state
            .history()
            .iter()
            .filter(|event| event.occurred_at.date_naive() == today)
            .count();

        ControllerStatus {
            config_summary: ConfigSummary {
                new_pipeline_percentage: flags.new_pipeline_percentage,
                enable_canary: flags.enable_canary,
                canary_sample_rate: flags.canary_sample_rate,
                forced_new_tables: flags.forced_new_tables.iter().cloned().collect(),
                manual_override: flags.manual_override,
                circuit_breaker_enabled: flags.circuit_breaker_enabled,
                auto_rollback_enabled: flags.auto_rollback_enabled,
                detailed_logging: flags.detailed_logging,
            },
            breaker_phase: self.breaker.phase(),
            rollback_phase: self.rollback_state.phase(),
            rollback_count_today,
            performance_summary: self.samples.summary(),
        }
    }

    /// Per-component health with a worst-of overall.
    pub fn health_check(&self) -> HealthReport {
        let breaker_phase = self.breaker.phase();
        let rollback_phase = self.rollback_state.phase();

        let breaker_health = ComponentHealth {
            name: "circuit_breaker".to_string(),
            state: match breaker_phase {
                BreakerPhase::Closed => HealthState::Healthy,
                BreakerPhase::HalfOpen | BreakerPhase::Open => HealthState::Degraded,
            },
            detail: format!("phase {}", breaker_phase),
        };
        let rollback_health = ComponentHealth {
            name: "rollback".to_string(),
            state: match rollback_phase {
                RollbackPhase::Active => HealthState::Healthy,
                RollbackPhase::RollingBack | RollbackPhase::RolledBack => HealthState::Degraded,
                RollbackPhase::RollbackFailed => HealthState::Failed,
            },
            detail: format!("phase {}", rollback_phase),
        };
        let store_health = match self.store.load() {
            Ok(_) => ComponentHealth {
                name: "state_store".to_string(),
                state: HealthState::Healthy,
                detail: format!("path {}", self.store.path().display()),
            },
            Err(e) => ComponentHealth {
                name: "state_store".to_string(),
                state: HealthState::Degraded,
                detail: e.to_string(),
            },
        };
        let config_health = ComponentHealth {
            name: "config".to_string(),
            state: HealthState::Healthy,
            detail: format!(
                "pipeline {}%, override {}",
                self.config.snapshot().new_pipeline_percentage,
                self.config.snapshot().manual_override
            ),
        };

        let components = vec![config_health, breaker_health, rollback_health, store_health];
        let overall = components
            .iter()
            .map(|c| c.state)
            .max()
            .unwrap_or(HealthState::Healthy);

        HealthReport { overall, components }
    }

    /// Execute an operator-initiated emergency rollback.
    pub fn emergency_rollback(&self, reason: &str, operator: &str) -> ManagementReply {
        match self.rollback.execute_emergency_rollback(reason, operator, false) {
            Ok(event) => ManagementReply::ok_with(
                "emergency rollback executed",
                serde_json::json!({ "event": event }),
            ),
            Err(e) => ManagementReply::failed(e.to_string()),
        }
    }

    /// Return routing to normal after a completed rollback.
    pub fn clear_rollback(&self, operator: &str) -> ManagementReply {
        match self.rollback.clear_rollback_state(operator) {
            Ok(event) => ManagementReply::ok_with(
                "rollback state cleared",
                serde_json::json!({ "event": event }),
            ),
            Err(e) => ManagementReply::failed(e.to_string()),
        }
    }

    /// Reset the circuit breaker to closed and persist the change.
    pub fn reset_circuit_breaker(&self) -> ManagementReply {
        self.breaker.reset();
        if let Err(e) = self.rollback.persist_current() {
            warn!(error = %e, "failed to persist breaker reset");
        }
        info!("circuit breaker reset by operator");
        ManagementReply::ok("circuit breaker reset to closed")
    }

    /// Run a specific engine for ops tooling, optionally bypassing the
    /// breaker check. Outcomes are still recorded.
    pub fn force_execute(
        &self,
        kind: EngineKind,
        bypass_breaker: bool,
    ) -> Result<GenerationResult, EngineError> {
        self.adapter
            .force_execute(kind, &GenerationRequest::all_tables(), bypass_breaker)
    }

    /// Assert rollback post-conditions.
    pub fn validate_rollback(&self) -> RollbackValidation {
        self.rollback.validate_rollback_success()
    }

    /// Execute a planned rollback or obtain a scheduled receipt.
    pub fn planned_rollback(&self, reason: &str, scheduled_at: DateTime<Utc>) -> ManagementReply {
        match self.rollback.execute_planned_rollback(reason, scheduled_at) {
            Ok(receipt) => ManagementReply::ok_with(
                if receipt.executed {
                    "planned rollback executed"
                } else {
                    "planned rollback scheduled; caller owns the timer"
                },
                serde_json::json!({ "receipt": receipt }),
            ),
            Err(e) => ManagementReply::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct OkEngine {
        calls: AtomicUsize,
    }

    impl OkEngine {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl GenerationEngine for OkEngine {
        fn execute(
            &self,
            _request: &GenerationRequest,
        ) -> Result<GenerationResult, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GenerationResult {
                success: true,
                execution_time: Duration::from_millis(5),
                generated_models: Vec::new(),
                generated_files: Vec::new(),
                errors: Vec::new(),
                statistics: Default::default(),
            })
        }
    }

    fn controller(dir: &tempfile::TempDir) -> MigrationController {
        let config = ControllerConfig {
            state_path: dir.path().join("state.json"),
            ..ControllerConfig::default()
        };
        MigrationController::with_parts(
            config,
            OkEngine::new(),
            OkEngine::new(),
            Arc::new(ManualClock::fixed()),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_status_reflects_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);

        let status = controller.status();
        assert_eq!(status.config_summary.new_pipeline_percentage, 0);
        assert_eq!(status.breaker_phase, BreakerPhase::Closed);
        assert_eq!(status.rollback_phase, RollbackPhase::Active);
        assert_eq!(status.rollback_count_today, 0);
        assert_eq!(status.performance_summary.samples, 0);
    }

    #[test]
    fn test_health_check_healthy_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);

        let report = controller.health_check();
        assert_eq!(report.overall, HealthState::Healthy);
        assert_eq!(report.components.len(), 4);
    }

    #[test]
    fn test_emergency_rollback_then_health_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);

        let reply = controller.emergency_rollback("INCIDENT-1", "alice");
        assert!(reply.success);

        let report = controller.health_check();
        assert_eq!(report.overall, HealthState::Degraded);
        assert_eq!(controller.status().rollback_phase, RollbackPhase::RolledBack);
        assert_eq!(controller.status().rollback_count_today, 1);
    }

    #[test]
    fn test_clear_rollback_requires_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);

        let reply = controller.clear_rollback("alice");
        assert!(!reply.success);

        controller.emergency_rollback("INCIDENT-1", "alice");
        let reply = controller.clear_rollback("alice");
        assert!(reply.success);
        assert_eq!(controller.status().rollback_phase, RollbackPhase::Active);
        assert_eq!(
            controller.config_snapshot().manual_override,
            routing::ManualOverride::None
        );
    }

    #[test]
    fn test_reset_circuit_breaker() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);

        controller.breaker.force_open();
        let reply = controller.reset_circuit_breaker();
        assert!(reply.success);
        assert_eq!(controller.status().breaker_phase, BreakerPhase::Closed);
    }

    #[test]
    fn test_update_config_refuses_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);

        let mut bad = FeatureFlagConfig::default();
        bad.new_pipeline_percentage = 250;
        assert!(controller.update_config(bad).is_err());

        let mut good = FeatureFlagConfig::default();
        good.new_pipeline_percentage = 75;
        controller.update_config(good).unwrap();
        assert_eq!(controller.config_snapshot().new_pipeline_percentage, 75);
    }

    #[test]
    fn test_validate_rollback_after_emergency() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);

        controller.emergency_rollback("INCIDENT-1", "alice");
        let validation = controller.validate_rollback();
        assert_eq!(validation.overall, rollback::ValidationHealth::Healthy);
    }

    #[test]
    fn test_planned_rollback_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);

        let future = controller.clock.now() + chrono::Duration::hours(2);
        let reply = controller.planned_rollback("maintenance", future);
        assert!(reply.success);
        assert!(reply.reason.contains("scheduled"));
        assert_eq!(controller.status().rollback_phase, RollbackPhase::Active);
    }
}
