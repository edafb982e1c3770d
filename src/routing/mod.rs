// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Feature-flag routing between the legacy and pipeline engines.
//!
//! Provides percentage-based traffic splitting with day-sticky routing,
//! manual overrides, forced-table lists, and canary sampling.

pub mod bucket;
mod config;
mod decision;

pub use config::{
    ConfigError, ConfigHandle, FeatureFlagConfig, ManualOverride, ENV_AUTO_ROLLBACK,
    ENV_CANARY_SAMPLE_PCT, ENV_CIRCUIT_BREAKER, ENV_DETAILED_LOGGING, ENV_ENABLE_CANARY,
    ENV_ERROR_THRESHOLD, ENV_ERROR_WINDOW_SECONDS, ENV_MANUAL_OVERRIDE, ENV_NEW_PIPELINE_PCT,
    ENV_NEW_PIPELINE_TABLES, ENV_RECOVERY_TIMEOUT_SECONDS,
};
pub use decision::{RouteReason, RoutingDecision};

use std::sync::Arc;

use tracing::info;

use crate::breaker::{BreakerPhase, CircuitBreaker};
use crate::clock::Clock;
use crate::engine::{EngineKind, GenerationRequest};
use crate::rollback::{RollbackPhase, RollbackStateHandle};

/// Per-request routing decision function.
///
/// A decision observes a consistent snapshot of `(config, breaker_phase,
/// rollback_phase)`; for a fixed config and UTC day the routing key uniquely
/// determines the outcome.
pub struct FlagRouter {
    config: Arc<ConfigHandle>,
    breaker: Arc<CircuitBreaker>,
    rollback: Arc<RollbackStateHandle>,
    clock: Arc<dyn Clock>,
}

impl FlagRouter {
    /// Create a router over the shared control-plane handles.
    pub fn new(
        config: Arc<ConfigHandle>,
        breaker: Arc<CircuitBreaker>,
        rollback: Arc<RollbackStateHandle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            breaker,
            rollback,
            clock,
        }
    }

    /// Decide which engine serves the request and whether to canary.
    pub fn decide(&self, request: &GenerationRequest) -> RoutingDecision {
        let config = self.config.snapshot();
        let now = self.clock.now();
        let day = self.clock.day_epoch();
        let key = request.routing_key.as_str();

        // Rollback short-circuits everything, including canary runs.
        if self.rollback.phase() == RollbackPhase::RolledBack {
            let decision = RoutingDecision {
                engine: EngineKind::Legacy,
                reason: RouteReason::RolledBack,
                canary_requested: false,
                decided_at: now,
            };
            log_decision(key, &decision);
            return decision;
        }

        // The breaker is consulted lazily and at most once per decision.
        // `allow_new_engine` is not a pure read: in `open` past the recovery
        // timeout it consumes the single recovery probe (open -> half_open),
        // so paths that never need the breaker must not fire it.
        let mut breaker_consult: Option<bool> = None;

        let (engine, reason) = match config.manual_override {
            // Force-legacy resolves the engine without touching the breaker.
            ManualOverride::ForceLegacy => (EngineKind::Legacy, RouteReason::Override),
            ManualOverride::ForceNew => {
                // The breaker vetoes even a force-new override.
                if self.consult_breaker(&config, &mut breaker_consult) {
                    (EngineKind::New, RouteReason::Override)
                } else {
                    (EngineKind::Legacy, RouteReason::BreakerOpen)
                }
            }
            ManualOverride::None => {
                if !self.consult_breaker(&config, &mut breaker_consult) {
                    (EngineKind::Legacy, RouteReason::BreakerOpen)
                } else if !key.is_empty() && config.forced_new_tables.contains(key) {
                    (EngineKind::New, RouteReason::ForcedTable)
                } else if config.new_pipeline_percentage == 0 {
                    (EngineKind::Legacy, RouteReason::Percentage)
                } else if config.new_pipeline_percentage == 100 {
                    (EngineKind::New, RouteReason::Percentage)
                } else {
                    let bucket = bucket::key_bucket(key, day);
                    if bucket < config.new_pipeline_percentage {
                        (EngineKind::New, RouteReason::Percentage)
                    } else {
                        (EngineKind::Legacy, RouteReason::Percentage)
                    }
                }
            }
        };

        // Canary is sampled independently of the engine choice, but never
        // runs when the breaker denies the pipeline engine. If the engine
        // choice never consulted the breaker, gate the canary on a
        // side-effect-free phase read so no probe is consumed here either.
        let canary_permitted = match breaker_consult {
            Some(allows) => allows,
            None => {
                !config.circuit_breaker_enabled
                    || self.breaker.phase() != BreakerPhase::Open
            }
        };
        let canary_requested = config.enable_canary
            && canary_permitted
            && (config.force_canary_mode
                || bucket::canary_bucket(key, day) < config.canary_sample_rate);

        let decision = RoutingDecision {
            engine,
            reason,
            canary_requested,
            decided_at: now,
        };
        log_decision(key, &decision);
        decision
    }

    /// Consult the breaker, caching the answer so one decision fires at most
    /// one probe transition.
    fn consult_breaker(&self, config: &FeatureFlagConfig, cache: &mut Option<bool>) -> bool {
        *cache.get_or_insert_with(|| {
            !config.circuit_breaker_enabled || self.breaker.allow_new_engine()
        })
    }
}

fn log_decision(key: &str, decision: &RoutingDecision) {
    info!(
        routing_key = %key,
        engine = %decision.engine,
        reason = %decision.reason,
        canary = decision.canary_requested,
        "routing decision"
    );
}
