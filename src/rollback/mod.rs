// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Rollback manager: the safety state machine that forces all traffic back
//! to the legacy engine and keeps the pipeline engine denied until an
//! operator clears the state.

mod event;
mod steps;

pub use event::{
    RollbackControllerState, RollbackEvent, RollbackPhase, RollbackTrigger, StepRecord,
    StepStatus, MAX_HISTORY,
};
pub use steps::{
    planned_steps, StepOutcome, STEP_NOTIFY, STEP_OPEN_BREAKER, STEP_PERSIST, STEP_SET_OVERRIDE,
};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::breaker::{BreakerPhase, CircuitBreaker};
use crate::clock::Clock;
use crate::routing::{ConfigHandle, ManualOverride};
use crate::state::{StateSnapshot, StateStore};
use crate::telemetry;

pub const NOTIFY_ROLLBACK_EXECUTED: &str = "rollback_executed";
pub const NOTIFY_ROLLBACK_CLEARED: &str = "rollback_cleared";
pub const NOTIFY_ROLLBACK_RECOVERY_ATTEMPTED: &str = "rollback_recovery_attempted";

/// Caller-supplied notification sink. Delivery is best-effort; panics are
/// caught, logged, and swallowed.
pub type Notifier = Arc<dyn Fn(&str, &serde_json::Value) + Send + Sync>;

/// Rollback operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RollbackError {
    #[error("rollback is not recommended: breaker is not open or a rollback is already in effect")]
    NotRecommended,

    #[error("already rolled back; pass force to roll back again")]
    AlreadyRolledBack,

    #[error("operation requires phase {expected}, current phase is {found}")]
    InvalidPhase {
        expected: RollbackPhase,
        found: RollbackPhase,
    },
}

/// Shared rollback state, readable by the router without going through the
/// manager.
#[derive(Default)]
pub struct RollbackStateHandle {
    inner: Mutex<RollbackControllerState>,
}

impl RollbackStateHandle {
    /// Current phase.
    pub fn phase(&self) -> RollbackPhase {
        self.inner.lock().phase
    }

    /// Set the phase, stamping `last_updated`.
    pub fn set_phase(&self, phase: RollbackPhase, now: DateTime<Utc>) {
        let mut state = self.inner.lock();
        state.phase = phase;
        state.last_updated = now;
    }

    /// Clone of the current history.
    pub fn history(&self) -> Vec<RollbackEvent> {
        self.inner.lock().history.clone()
    }

    /// Restore phase and history from a persisted snapshot.
    pub fn restore(&self, phase: RollbackPhase, history: Vec<RollbackEvent>, now: DateTime<Utc>) {
        let mut state = self.inner.lock();
        state.phase = phase;
        state.history = history;
        state.last_updated = now;
    }

    fn with<R>(&self, f: impl FnOnce(&mut RollbackControllerState) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

/// Severity attached to a rollback recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSeverity {
    Critical,
    Info,
}

/// Whether the controller should roll back right now, and why.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackRecommendation {
    pub recommended: bool,
    pub severity: RecommendationSeverity,
    pub reasons: Vec<String>,
}

/// Receipt for a planned rollback request.
///
/// When `executed` is false the caller owns the timer: this component does
/// not schedule anything and performs no mutation for future times.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedRollback {
    pub reason: String,
    pub scheduled_at: DateTime<Utc>,
    pub executed: bool,
    pub event: Option<RollbackEvent>,
}

/// Result of an automatic rollback request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutomaticRollback {
    pub dry_run: bool,
    pub planned_steps: Vec<String>,
    pub event: Option<RollbackEvent>,
}

/// One post-condition check from [`RollbackManager::validate_rollback_success`].
#[derive(Debug, Clone, Serialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub details: String,
}

/// Overall validation health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationHealth {
    Healthy,
    Degraded,
    Failed,
}

/// Structured rollback validation report.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackValidation {
    pub overall: ValidationHealth,
    pub checks: Vec<ValidationCheck>,
}

/// Coordinates safe fallback to the legacy engine.
pub struct RollbackManager {
    state: Arc<RollbackStateHandle>,
    config: Arc<ConfigHandle>,
    breaker: Arc<CircuitBreaker>,
    store: Arc<StateStore>,
    clock: Arc<dyn Clock>,
    notifier: Option<Notifier>,
}

impl RollbackManager {
    pub fn new(
        state: Arc<RollbackStateHandle>,
        config: Arc<ConfigHandle>,
        breaker: Arc<CircuitBreaker>,
        store: Arc<StateStore>,
        clock: Arc<dyn Clock>,
        notifier: Option<Notifier>,
    ) -> Self {
        Self {
            state,
            config,
            breaker,
            store,
            clock,
            notifier,
        }
    }

    /// Current rollback phase.
    pub fn phase(&self) -> RollbackPhase {
        self.state.phase()
    }

    /// Clone of the event history.
    pub fn history(&self) -> Vec<RollbackEvent> {
        self.state.history()
    }

    /// Whether an automatic rollback should run now.
    ///
    /// True iff the breaker is open while the controller is still active.
    pub fn rollback_recommended(&self) -> RollbackRecommendation {
        let recommended = self.breaker.phase() == BreakerPhase::Open
            && self.state.phase() == RollbackPhase::Active;
        RollbackRecommendation {
            recommended,
            severity: if recommended {
                RecommendationSeverity::Critical
            } else {
                RecommendationSeverity::Info
            },
            reasons: if recommended {
                vec!["circuit_breaker_tripped".to_string()]
            } else {
                Vec::new()
            },
        }
    }

    /// Execute an automatic rollback if recommended.
    ///
    /// With `dry_run` the planned steps are returned and nothing mutates.
    pub fn execute_automatic_rollback(
        &self,
        dry_run: bool,
    ) -> Result<AutomaticRollback, RollbackError> {
        if !self.rollback_recommended().recommended {
            return Err(RollbackError::NotRecommended);
        }
        if dry_run {
            return Ok(AutomaticRollback {
                dry_run: true,
                planned_steps: planned_steps(),
                event: None,
            });
        }
        let event = self.perform_rollback(
            RollbackTrigger::AutoBreaker,
            "circuit_breaker_tripped",
            None,
            None,
            NOTIFY_ROLLBACK_EXECUTED,
        );
        Ok(AutomaticRollback {
            dry_run: false,
            planned_steps: planned_steps(),
            event: Some(event),
        })
    }

    /// Execute an operator-initiated emergency rollback.
    ///
    /// Refuses when already rolled back unless `force` is set.
    pub fn execute_emergency_rollback(
        &self,
        reason: &str,
        operator: &str,
        force: bool,
    ) -> Result<RollbackEvent, RollbackError> {
        if !force && self.state.phase() == RollbackPhase::RolledBack {
            return Err(RollbackError::AlreadyRolledBack);
        }
        Ok(self.perform_rollback(
            RollbackTrigger::ManualEmergency,
            reason,
            Some(operator.to_string()),
            None,
            NOTIFY_ROLLBACK_EXECUTED,
        ))
    }

    /// Execute a planned rollback, or return a receipt for a future time.
    ///
    /// This component does not own a timer; the caller re-invokes at the
    /// scheduled time.
    pub fn execute_planned_rollback(
        &self,
        reason: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<PlannedRollback, RollbackError> {
        if self.state.phase() == RollbackPhase::RolledBack {
            return Err(RollbackError::AlreadyRolledBack);
        }
        let now = self.clock.now();
        if scheduled_at > now {
            return Ok(PlannedRollback {
                reason: reason.to_string(),
                scheduled_at,
                executed: false,
                event: None,
            });
        }
        let event = self.perform_rollback(
            RollbackTrigger::Planned,
            reason,
            None,
            Some(scheduled_at),
            NOTIFY_ROLLBACK_EXECUTED,
        );
        Ok(PlannedRollback {
            reason: reason.to_string(),
            scheduled_at,
            executed: true,
            event: Some(event),
        })
    }

    /// Return routing to normal after a completed rollback.
    ///
    /// Resets the manual override to none and records a history entry.
    pub fn clear_rollback_state(&self, operator: &str) -> Result<RollbackEvent, RollbackError> {
        let found = self.state.phase();
        if found != RollbackPhase::RolledBack {
            return Err(RollbackError::InvalidPhase {
                expected: RollbackPhase::RolledBack,
                found,
            });
        }

        let now = self.clock.now();
        self.config.set_manual_override(ManualOverride::None);

        let event = RollbackEvent {
            id: uuid::Uuid::new_v4().to_string(),
            trigger: RollbackTrigger::ManualClear,
            reason: format!("rollback cleared by {}", operator),
            operator: Some(operator.to_string()),
            scheduled_at: None,
            occurred_at: now,
            succeeded: true,
            errors: Vec::new(),
            recovery_steps: Vec::new(),
        };
        self.state.with(|state| {
            state.phase = RollbackPhase::Active;
            state.last_updated = now;
            state.push_event(event.clone());
        });

        if let Err(e) = self.persist_current() {
            warn!(error = %e, "failed to persist cleared rollback state");
        }
        self.notify(
            NOTIFY_ROLLBACK_CLEARED,
            &serde_json::json!({ "operator": operator, "cleared_at": now }),
        );
        info!(operator, "rollback state cleared, routing returned to normal");
        Ok(event)
    }

    /// Re-run the rollback steps after a failed rollback.
    pub fn attempt_rollback_recovery(&self) -> Result<RollbackEvent, RollbackError> {
        let found = self.state.phase();
        if found != RollbackPhase::RollbackFailed {
            return Err(RollbackError::InvalidPhase {
                expected: RollbackPhase::RollbackFailed,
                found,
            });
        }
        Ok(self.perform_rollback(
            RollbackTrigger::ManualEmergency,
            "rollback recovery attempt",
            None,
            None,
            NOTIFY_ROLLBACK_RECOVERY_ATTEMPTED,
        ))
    }

    /// Assert rollback post-conditions.
    pub fn validate_rollback_success(&self) -> RollbackValidation {
        let override_ok =
            self.config.snapshot().manual_override == ManualOverride::ForceLegacy;
        let breaker_ok = self.breaker.phase() == BreakerPhase::Open;
        let persisted_phase = self
            .store
            .load()
            .ok()
            .map(|snapshot| snapshot.rollback_phase);
        let persisted_ok = persisted_phase == Some(RollbackPhase::RolledBack);

        let checks = vec![
            ValidationCheck {
                name: "manual_override_force_legacy".to_string(),
                passed: override_ok,
                details: format!(
                    "manual_override is {}",
                    self.config.snapshot().manual_override
                ),
            },
            ValidationCheck {
                name: "breaker_open".to_string(),
                passed: breaker_ok,
                details: format!("breaker phase is {}", self.breaker.phase()),
            },
            ValidationCheck {
                name: "state_file_rolled_back".to_string(),
                passed: persisted_ok,
                details: match persisted_phase {
                    Some(phase) => format!("state file phase is {}", phase),
                    None => "state file unreadable".to_string(),
                },
            },
        ];

        let overall = if override_ok && breaker_ok && persisted_ok {
            ValidationHealth::Healthy
        } else if override_ok && breaker_ok {
            ValidationHealth::Degraded
        } else {
            ValidationHealth::Failed
        };

        RollbackValidation { overall, checks }
    }

    /// Build a snapshot of the current rollback and breaker state.
    pub fn current_snapshot(&self) -> StateSnapshot {
        let (phase, history) = self
            .state
            .with(|state| (state.phase, state.history.clone()));
        StateSnapshot {
            schema_version: crate::state::SCHEMA_VERSION,
            rollback_phase: phase,
            rollback_history: history,
            breaker_phase: self.breaker.phase(),
            breaker_opened_at: self.breaker.opened_at(),
            last_updated: self.clock.now(),
        }
    }

    /// Persist the current snapshot.
    pub fn persist_current(&self) -> Result<(), crate::state::StateError> {
        self.store.save(&self.current_snapshot())
    }

    fn perform_rollback(
        &self,
        trigger: RollbackTrigger,
        reason: &str,
        operator: Option<String>,
        scheduled_at: Option<DateTime<Utc>>,
        notify_kind: &str,
    ) -> RollbackEvent {
        let now = self.clock.now();
        self.state.set_phase(RollbackPhase::RollingBack, now);

        let mut event = RollbackEvent {
            id: uuid::Uuid::new_v4().to_string(),
            trigger,
            reason: reason.to_string(),
            operator,
            scheduled_at,
            occurred_at: now,
            succeeded: false,
            errors: Vec::new(),
            recovery_steps: Vec::new(),
        };

        let set_override = steps::run_step(STEP_SET_OVERRIDE, || {
            self.config.set_manual_override(ManualOverride::ForceLegacy);
            Ok(())
        });
        apply_outcome(&mut event, &set_override);

        // Deny the pipeline engine for the duration of the rollback, even
        // under a force-new override.
        let open_breaker = steps::run_step(STEP_OPEN_BREAKER, || {
            self.breaker.force_open();
            Ok(())
        });
        apply_outcome(&mut event, &open_breaker);

        event.succeeded = set_override.ok && open_breaker.ok;
        let phase = if event.succeeded {
            RollbackPhase::RolledBack
        } else {
            RollbackPhase::RollbackFailed
        };
        self.state.with(|state| {
            state.phase = phase;
            state.last_updated = now;
            state.push_event(event.clone());
        });

        // The event must reach disk before the notification fires.
        let snapshot = self.current_snapshot();
        let persist = steps::run_step(STEP_PERSIST, || {
            self.store.save(&snapshot).map_err(|e| e.to_string())
        });
        if !persist.ok {
            event.succeeded = false;
            self.state
                .set_phase(RollbackPhase::RollbackFailed, self.clock.now());
        }
        apply_outcome(&mut event, &persist);

        let payload = serde_json::json!({
            "id": event.id,
            "trigger": event.trigger,
            "reason": event.reason,
            "succeeded": event.succeeded,
        });
        let notify = steps::run_step(STEP_NOTIFY, || {
            self.notify(notify_kind, &payload);
            Ok(())
        });
        apply_outcome(&mut event, &notify);

        // Reconcile the stored history entry with the late step records.
        self.state.with(|state| {
            if let Some(last) = state.history.last_mut() {
                *last = event.clone();
            }
        });

        telemetry::record_rollback(&event.trigger.to_string(), event.succeeded);
        if event.succeeded {
            info!(
                trigger = %event.trigger,
                reason = %event.reason,
                "rollback executed, all traffic forced to legacy engine"
            );
        } else {
            error!(
                trigger = %event.trigger,
                reason = %event.reason,
                errors = ?event.errors,
                "rollback failed, phase is rollback_failed"
            );
        }
        event
    }

    fn notify(&self, kind: &str, payload: &serde_json::Value) {
        if let Some(notifier) = &self.notifier {
            let result = catch_unwind(AssertUnwindSafe(|| notifier(kind, payload)));
            if result.is_err() {
                warn!(kind, "notification callback panicked; continuing");
            }
        }
    }
}

fn apply_outcome(event: &mut RollbackEvent, outcome: &StepOutcome) {
    event.recovery_steps.push(outcome.to_record());
    if let Some(error) = &outcome.error {
        event.errors.push(format!("{}: {}", outcome.name, error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::routing::FeatureFlagConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        manager: RollbackManager,
        state: Arc<RollbackStateHandle>,
        config: Arc<ConfigHandle>,
        breaker: Arc<CircuitBreaker>,
        store: Arc<StateStore>,
        clock: Arc<ManualClock>,
        _dir: tempfile::TempDir,
    }

    fn fixture_with_notifier(notifier: Option<Notifier>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(ConfigHandle::new(FeatureFlagConfig::default()).unwrap());
        let clock = Arc::new(ManualClock::fixed());
        let breaker = Arc::new(CircuitBreaker::new(config.clone(), clock.clone()));
        let state = Arc::new(RollbackStateHandle::default());
        let store = Arc::new(StateStore::new(dir.path().join("state.json")));
        let manager = RollbackManager::new(
            state.clone(),
            config.clone(),
            breaker.clone(),
            store.clone(),
            clock.clone(),
            notifier,
        );
        Fixture {
            manager,
            state,
            config,
            breaker,
            store,
            clock,
            _dir: dir,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_notifier(None)
    }

    #[test]
    fn test_not_recommended_when_breaker_closed() {
        let f = fixture();
        let rec = f.manager.rollback_recommended();
        assert!(!rec.recommended);
        assert_eq!(rec.severity, RecommendationSeverity::Info);
        assert!(rec.reasons.is_empty());
    }

    #[test]
    fn test_recommended_when_breaker_open() {
        let f = fixture();
        f.breaker.force_open();
        let rec = f.manager.rollback_recommended();
        assert!(rec.recommended);
        assert_eq!(rec.severity, RecommendationSeverity::Critical);
        assert_eq!(rec.reasons, vec!["circuit_breaker_tripped".to_string()]);
    }

    #[test]
    fn test_automatic_rollback_requires_recommendation() {
        let f = fixture();
        assert_eq!(
            f.manager.execute_automatic_rollback(false),
            Err(RollbackError::NotRecommended)
        );
    }

    #[test]
    fn test_automatic_rollback_dry_run_mutates_nothing() {
        let f = fixture();
        f.breaker.force_open();

        let result = f.manager.execute_automatic_rollback(true).unwrap();
        assert!(result.dry_run);
        assert_eq!(result.planned_steps.len(), 4);
        assert!(result.event.is_none());
        assert_eq!(f.state.phase(), RollbackPhase::Active);
        assert!(f.manager.history().is_empty());
    }

    #[test]
    fn test_automatic_rollback_executes() {
        let f = fixture();
        f.breaker.force_open();

        let result = f.manager.execute_automatic_rollback(false).unwrap();
        let event = result.event.unwrap();
        assert!(event.succeeded);
        assert_eq!(event.trigger, RollbackTrigger::AutoBreaker);
        assert_eq!(event.recovery_steps.len(), 4);
        assert_eq!(f.state.phase(), RollbackPhase::RolledBack);
        assert_eq!(
            f.config.snapshot().manual_override,
            ManualOverride::ForceLegacy
        );
        assert_eq!(f.breaker.phase(), BreakerPhase::Open);
    }

    #[test]
    fn test_emergency_rollback_records_event() {
        let f = fixture();
        let event = f
            .manager
            .execute_emergency_rollback("INCIDENT-1", "alice", false)
            .unwrap();

        assert!(event.succeeded);
        assert_eq!(event.reason, "INCIDENT-1");
        assert_eq!(event.operator.as_deref(), Some("alice"));
        assert_eq!(f.manager.history().len(), 1);

        // Persisted before notification: the file already has the event.
        let snapshot = f.store.load().unwrap();
        assert_eq!(snapshot.rollback_phase, RollbackPhase::RolledBack);
        assert_eq!(snapshot.rollback_history.len(), 1);
        assert_eq!(snapshot.rollback_history[0].reason, "INCIDENT-1");
    }

    #[test]
    fn test_emergency_rollback_refuses_when_rolled_back() {
        let f = fixture();
        f.manager
            .execute_emergency_rollback("first", "alice", false)
            .unwrap();

        assert_eq!(
            f.manager.execute_emergency_rollback("second", "bob", false),
            Err(RollbackError::AlreadyRolledBack)
        );

        // Force executes regardless.
        let event = f
            .manager
            .execute_emergency_rollback("second", "bob", true)
            .unwrap();
        assert!(event.succeeded);
        assert_eq!(f.manager.history().len(), 2);
    }

    #[test]
    fn test_planned_rollback_future_returns_receipt() {
        let f = fixture();
        let later = f.clock.now() + chrono::Duration::hours(1);

        let receipt = f
            .manager
            .execute_planned_rollback("maintenance window", later)
            .unwrap();
        assert!(!receipt.executed);
        assert!(receipt.event.is_none());
        assert_eq!(f.state.phase(), RollbackPhase::Active);
        assert!(f.manager.history().is_empty());
    }

    #[test]
    fn test_planned_rollback_due_executes() {
        let f = fixture();
        let due = f.clock.now() - chrono::Duration::minutes(1);

        let receipt = f
            .manager
            .execute_planned_rollback("maintenance window", due)
            .unwrap();
        assert!(receipt.executed);
        let event = receipt.event.unwrap();
        assert_eq!(event.trigger, RollbackTrigger::Planned);
        assert_eq!(event.scheduled_at, Some(due));
        assert_eq!(f.state.phase(), RollbackPhase::RolledBack);
    }

    #[test]
    fn test_clear_rollback_state() {
        let f = fixture();
        f.manager
            .execute_emergency_rollback("INCIDENT-1", "alice", false)
            .unwrap();

        let event = f.manager.clear_rollback_state("bob").unwrap();
        assert_eq!(event.trigger, RollbackTrigger::ManualClear);
        assert_eq!(f.state.phase(), RollbackPhase::Active);
        assert_eq!(f.config.snapshot().manual_override, ManualOverride::None);
        assert_eq!(f.manager.history().len(), 2);

        let snapshot = f.store.load().unwrap();
        assert_eq!(snapshot.rollback_phase, RollbackPhase::Active);
    }

    #[test]
    fn test_clear_requires_rolled_back_phase() {
        let f = fixture();
        assert!(matches!(
            f.manager.clear_rollback_state("bob"),
            Err(RollbackError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn test_recovery_requires_failed_phase() {
        let f = fixture();
        assert!(matches!(
            f.manager.attempt_rollback_recovery(),
            Err(RollbackError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn test_recovery_after_persist_failure() {
        use std::path::PathBuf;

        // Point the store at an unwritable path to fail the persist step.
        let config = Arc::new(ConfigHandle::new(FeatureFlagConfig::default()).unwrap());
        let clock = Arc::new(ManualClock::fixed());
        let breaker = Arc::new(CircuitBreaker::new(config.clone(), clock.clone()));
        let state = Arc::new(RollbackStateHandle::default());
        let store = Arc::new(StateStore::new(PathBuf::from(
            "/proc/modelgen-migrate-denied/state.json",
        )));
        let manager = RollbackManager::new(
            state.clone(),
            config,
            breaker,
            store,
            clock,
            None,
        );

        let event = manager
            .execute_emergency_rollback("INCIDENT-2", "alice", false)
            .unwrap();
        assert!(!event.succeeded);
        assert!(!event.errors.is_empty());
        assert_eq!(state.phase(), RollbackPhase::RollbackFailed);

        // Recovery re-runs the steps and fails the same way here, but the
        // precondition is satisfied and an event is recorded.
        let recovery = manager.attempt_rollback_recovery().unwrap();
        assert!(!recovery.succeeded);
        assert_eq!(state.phase(), RollbackPhase::RollbackFailed);
    }

    #[test]
    fn test_validation_after_rollback() {
        let f = fixture();
        f.manager
            .execute_emergency_rollback("INCIDENT-1", "alice", false)
            .unwrap();

        let validation = f.manager.validate_rollback_success();
        assert_eq!(validation.overall, ValidationHealth::Healthy);
        assert!(validation.checks.iter().all(|c| c.passed));
    }

    #[test]
    fn test_validation_without_rollback_fails() {
        let f = fixture();
        let validation = f.manager.validate_rollback_success();
        assert_eq!(validation.overall, ValidationHealth::Failed);
    }

    #[test]
    fn test_notifier_receives_rollback_event() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let notifier: Notifier = Arc::new(move |kind, payload| {
            if kind == NOTIFY_ROLLBACK_EXECUTED {
                assert_eq!(payload["reason"], "INCIDENT-1");
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });
        let f = fixture_with_notifier(Some(notifier));

        f.manager
            .execute_emergency_rollback("INCIDENT-1", "alice", false)
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notifier_panic_is_swallowed() {
        let notifier: Notifier = Arc::new(|_, _| panic!("broken sink"));
        let f = fixture_with_notifier(Some(notifier));

        let event = f
            .manager
            .execute_emergency_rollback("INCIDENT-1", "alice", false)
            .unwrap();
        // The rollback itself still succeeds.
        assert!(event.succeeded);
        assert_eq!(f.state.phase(), RollbackPhase::RolledBack);
    }

    #[test]
    fn test_history_bounded_across_forced_rollbacks() {
        let f = fixture();
        for i in 0..120 {
            f.manager
                .execute_emergency_rollback(&format!("r{}", i), "alice", true)
                .unwrap();
        }
        assert!(f.manager.history().len() <= MAX_HISTORY);
    }
}
