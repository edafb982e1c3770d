// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Rollback steps as pure units of work.
//!
//! Each step returns a [`StepOutcome`]; the manager folds a sequence of
//! outcomes into a final phase instead of relying on error flow for control.

use std::time::Instant;

use super::event::{StepRecord, StepStatus};

pub const STEP_SET_OVERRIDE: &str = "set_override_force_legacy";
pub const STEP_OPEN_BREAKER: &str = "force_open_breaker";
pub const STEP_PERSIST: &str = "persist_state";
pub const STEP_NOTIFY: &str = "emit_notification";

/// Result of one executed step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub name: &'static str,
    pub ok: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl StepOutcome {
    /// Convert into the persisted record form.
    pub fn to_record(&self) -> StepRecord {
        StepRecord {
            name: self.name.to_string(),
            status: if self.ok {
                StepStatus::Succeeded
            } else {
                StepStatus::Failed
            },
            duration_ms: self.duration_ms,
        }
    }
}

/// Run a step, timing it and capturing its error.
pub fn run_step<F>(name: &'static str, f: F) -> StepOutcome
where
    F: FnOnce() -> Result<(), String>,
{
    let started = Instant::now();
    let result = f();
    let duration_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(()) => StepOutcome {
            name,
            ok: true,
            error: None,
            duration_ms,
        },
        Err(error) => StepOutcome {
            name,
            ok: false,
            error: Some(error),
            duration_ms,
        },
    }
}

/// The ordered step names for a rollback execution.
pub fn planned_steps() -> Vec<String> {
    vec![
        STEP_SET_OVERRIDE.to_string(),
        STEP_OPEN_BREAKER.to_string(),
        STEP_PERSIST.to_string(),
        STEP_NOTIFY.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_step_success() {
        let outcome = run_step("demo", || Ok(()));
        assert!(outcome.ok);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.to_record().status, StepStatus::Succeeded);
    }

    #[test]
    fn test_run_step_failure_captures_error() {
        let outcome = run_step("demo", || Err("disk full".to_string()));
        assert!(!outcome.ok);
        assert_eq!(outcome.error.as_deref(), Some("disk full"));
        assert_eq!(outcome.to_record().status, StepStatus::Failed);
    }

    #[test]
    fn test_planned_steps_order() {
        let steps = planned_steps();
        assert_eq!(
            steps,
            vec![
                STEP_SET_OVERRIDE,
                STEP_OPEN_BREAKER,
                STEP_PERSIST,
                STEP_NOTIFY,
            ]
        );
    }
}
