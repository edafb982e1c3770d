// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Routing decision values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::EngineKind;

/// Why a request was routed the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    /// Percentage split resolved the engine.
    Percentage,
    /// The routing key is on the forced-new-tables list.
    ForcedTable,
    /// Manual override resolved the engine.
    Override,
    /// The circuit breaker denied the pipeline engine.
    BreakerOpen,
    /// A rollback is in effect.
    RolledBack,
}

impl std::fmt::Display for RouteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteReason::Percentage => write!(f, "percentage"),
            RouteReason::ForcedTable => write!(f, "forced_table"),
            RouteReason::Override => write!(f, "override"),
            RouteReason::BreakerOpen => write!(f, "breaker_open"),
            RouteReason::RolledBack => write!(f, "rolled_back"),
        }
    }
}

/// The outcome of routing one request. Logged but not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Engine chosen for the primary run.
    pub engine: EngineKind,
    /// Rule that resolved the choice.
    pub reason: RouteReason,
    /// Whether a canary run of the other engine was requested.
    pub canary_requested: bool,
    /// When the decision was made.
    pub decided_at: DateTime<Utc>,
}

impl RoutingDecision {
    /// Whether the pipeline engine was chosen.
    pub fn is_new(&self) -> bool {
        self.engine == EngineKind::New
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_display() {
        assert_eq!(RouteReason::Percentage.to_string(), "percentage");
        assert_eq!(RouteReason::BreakerOpen.to_string(), "breaker_open");
        assert_eq!(RouteReason::RolledBack.to_string(), "rolled_back");
    }

    #[test]
    fn test_decision_serialization() {
        let decision = RoutingDecision {
            engine: EngineKind::New,
            reason: RouteReason::ForcedTable,
            canary_requested: true,
            decided_at: Utc::now(),
        };

        let json = serde_json::to_string(&decision).unwrap();
        assert!(json.contains("\"engine\":\"new\""));
        assert!(json.contains("\"reason\":\"forced_table\""));
    }

    #[test]
    fn test_is_new() {
        let decision = RoutingDecision {
            engine: EngineKind::Legacy,
            reason: RouteReason::Percentage,
            canary_requested: false,
            decided_at: Utc::now(),
        };
        assert!(!decision.is_new());
    }
}
