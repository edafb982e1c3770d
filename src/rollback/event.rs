// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Rollback state machine values and event history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum rollback events retained in history.
pub const MAX_HISTORY: usize = 100;

/// Rollback controller phases.
///
/// Transitions form a DAG: `active -> rolling_back -> (rolled_back |
/// rollback_failed)`; `rolled_back -> active` via explicit clear;
/// `rollback_failed -> rolling_back` via a recovery attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPhase {
    #[default]
    Active,
    RollingBack,
    RolledBack,
    RollbackFailed,
}

impl std::fmt::Display for RollbackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RollbackPhase::Active => write!(f, "active"),
            RollbackPhase::RollingBack => write!(f, "rolling_back"),
            RollbackPhase::RolledBack => write!(f, "rolled_back"),
            RollbackPhase::RollbackFailed => write!(f, "rollback_failed"),
        }
    }
}

/// What initiated a rollback event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackTrigger {
    /// The circuit breaker tripped and auto-rollback fired.
    AutoBreaker,
    /// An operator forced an emergency rollback.
    ManualEmergency,
    /// A planned rollback reached its scheduled time.
    Planned,
    /// An operator cleared the rollback state.
    ManualClear,
}

impl std::fmt::Display for RollbackTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RollbackTrigger::AutoBreaker => write!(f, "auto_breaker"),
            RollbackTrigger::ManualEmergency => write!(f, "manual_emergency"),
            RollbackTrigger::Planned => write!(f, "planned"),
            RollbackTrigger::ManualClear => write!(f, "manual_clear"),
        }
    }
}

/// Outcome of one named rollback step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
}

/// Record of one executed rollback step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub status: StepStatus,
    pub duration_ms: u64,
}

/// One entry in the rollback history. Append-only, bounded to the most
/// recent [`MAX_HISTORY`] entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackEvent {
    /// Unique event id.
    pub id: String,
    /// What initiated the event.
    pub trigger: RollbackTrigger,
    /// Operator-supplied or generated reason.
    pub reason: String,
    /// Operator identity, when known.
    #[serde(default)]
    pub operator: Option<String>,
    /// Scheduled time for planned rollbacks.
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When the event executed.
    pub occurred_at: DateTime<Utc>,
    /// Whether every mutating step succeeded.
    pub succeeded: bool,
    /// Step error messages.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Per-step outcomes.
    #[serde(default)]
    pub recovery_steps: Vec<StepRecord>,
}

/// Persistent rollback controller state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackControllerState {
    pub phase: RollbackPhase,
    pub history: Vec<RollbackEvent>,
    pub last_updated: DateTime<Utc>,
}

impl Default for RollbackControllerState {
    fn default() -> Self {
        Self {
            phase: RollbackPhase::Active,
            history: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

impl RollbackControllerState {
    /// Append an event, pruning history to the bound.
    pub fn push_event(&mut self, event: RollbackEvent) {
        self.history.push(event);
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(0..excess);
        }
    }
}
