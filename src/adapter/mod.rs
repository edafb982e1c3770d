// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Migration adapter: the public request entry point.
//!
//! Routes each request, executes the chosen engine, optionally runs a
//! parallel canary of the other engine with a bounded timeout, compares
//! outputs, feeds the circuit breaker, and falls back to the legacy engine
//! when the pipeline engine fails.

mod samples;

pub use samples::{PerformanceSample, PerformanceSummary, PerformanceTracker, MAX_SAMPLES};

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::breaker::{BreakerPhase, CircuitBreaker};
use crate::clock::Clock;
use crate::comparison::OutputComparator;
use crate::engine::{EngineError, EngineKind, GenerationEngine, GenerationRequest, GenerationResult};
use crate::rollback::RollbackManager;
use crate::routing::{ConfigHandle, FlagRouter, RoutingDecision};
use crate::telemetry;

/// Adapter execution options.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Serve the request from the legacy engine when the pipeline engine
    /// fails or raises.
    pub fallback_to_legacy_on_error: bool,
    /// Canary wait bound when no samples exist yet. With samples, the
    /// effective bound is twice the average legacy runtime.
    pub canary_timeout: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            fallback_to_legacy_on_error: true,
            canary_timeout: Duration::from_secs(30),
        }
    }
}

/// Orchestrates routing, execution, canary, metrics, and fallback.
pub struct MigrationAdapter {
    router: Arc<FlagRouter>,
    legacy_engine: Arc<dyn GenerationEngine>,
    new_engine: Arc<dyn GenerationEngine>,
    comparator: Arc<OutputComparator>,
    breaker: Arc<CircuitBreaker>,
    rollback: Arc<RollbackManager>,
    samples: Arc<PerformanceTracker>,
    config: Arc<ConfigHandle>,
    adapter_config: AdapterConfig,
    clock: Arc<dyn Clock>,
}

impl MigrationAdapter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        router: Arc<FlagRouter>,
        legacy_engine: Arc<dyn GenerationEngine>,
        new_engine: Arc<dyn GenerationEngine>,
        comparator: Arc<OutputComparator>,
        breaker: Arc<CircuitBreaker>,
        rollback: Arc<RollbackManager>,
        samples: Arc<PerformanceTracker>,
        config: Arc<ConfigHandle>,
        adapter_config: AdapterConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            router,
            legacy_engine,
            new_engine,
            comparator,
            breaker,
            rollback,
            samples,
            config,
            adapter_config,
            clock,
        }
    }

    /// Serve one generation request.
    ///
    /// Never fails from routing logic; an `Err` means the chosen engine
    /// raised and no fallback result was available.
    pub fn execute(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, EngineError> {
        let decision = self.router.decide(request);
        telemetry::record_request(&decision.engine.to_string(), &decision.reason.to_string());

        // The canary starts first so both engines run in parallel. Neither
        // holds any controller lock while executing.
        let canary_rx = if decision.canary_requested {
            Some(self.spawn_secondary(decision.engine.other(), request))
        } else {
            None
        };

        let started = Instant::now();
        let primary = self.engine_arc(decision.engine).execute(request);
        telemetry::record_engine_latency(
            &decision.engine.to_string(),
            started.elapsed().as_millis() as u64,
        );

        if let Some(rx) = canary_rx {
            self.collect_canary(&decision, &primary, rx, request);
        }

        self.settle(decision, primary, request)
    }

    /// Run a specific engine directly, for ops tooling.
    ///
    /// The breaker check can be bypassed, but outcomes are still recorded.
    pub fn force_execute(
        &self,
        engine: EngineKind,
        request: &GenerationRequest,
        bypass_breaker: bool,
    ) -> Result<GenerationResult, EngineError> {
        if engine == EngineKind::New && !bypass_breaker {
            let config = self.config.snapshot();
            if config.circuit_breaker_enabled && !self.breaker.allow_new_engine() {
                return Ok(GenerationResult::failure(vec![
                    "circuit breaker denies the pipeline engine; pass bypass_breaker to override"
                        .to_string(),
                ]));
            }
        }

        info!(engine = %engine, bypass_breaker, "force executing engine");
        let result = self.engine_arc(engine).execute(request);
        if engine == EngineKind::New {
            match &result {
                Ok(r) if r.success => self.breaker.record_success(),
                Ok(r) => self.breaker.record_failure(&failure_summary(r)),
                Err(e) => self.breaker.record_failure(&e.to_string()),
            }
        }
        result
    }

    /// Effective canary wait bound: twice the average legacy runtime once
    /// samples exist, otherwise the configured default.
    pub fn effective_canary_timeout(&self) -> Duration {
        match self.samples.avg_legacy_time() {
            Some(avg) if !avg.is_zero() => (avg * 2).max(Duration::from_millis(100)),
            _ => self.adapter_config.canary_timeout,
        }
    }

    /// Retained performance samples.
    pub fn samples(&self) -> &PerformanceTracker {
        &self.samples
    }

    fn engine_arc(&self, kind: EngineKind) -> Arc<dyn GenerationEngine> {
        match kind {
            EngineKind::Legacy => Arc::clone(&self.legacy_engine),
            EngineKind::New => Arc::clone(&self.new_engine),
        }
    }

    fn spawn_secondary(
        &self,
        kind: EngineKind,
        request: &GenerationRequest,
    ) -> mpsc::Receiver<Result<GenerationResult, EngineError>> {
        let engine = self.engine_arc(kind);
        let request = request.clone();
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("canary-engine".to_string())
            .spawn(move || {
                let _ = tx.send(engine.execute(&request));
            });
        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn canary thread");
        }
        rx
    }

    fn collect_canary(
        &self,
        decision: &RoutingDecision,
        primary: &Result<GenerationResult, EngineError>,
        rx: mpsc::Receiver<Result<GenerationResult, EngineError>>,
        request: &GenerationRequest,
    ) {
        let wait_started = Instant::now();
        let outcome = rx.recv_timeout(self.effective_canary_timeout());
        let waited = wait_started.elapsed();

        match outcome {
            Ok(Ok(canary_result)) => {
                if let Ok(primary_result) = primary {
                    self.compare_and_record(decision, primary_result, &canary_result, waited, request);
                }
            }
            Ok(Err(e)) => {
                // A canary failure never counts against the breaker.
                debug!(error = %e, "canary engine returned an error");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    routing_key = %request.routing_key,
                    timeout_ms = self.effective_canary_timeout().as_millis() as u64,
                    "canary abandoned on timeout"
                );
                telemetry::record_canary_timeout();
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("canary thread terminated without a result");
            }
        }
    }

    fn compare_and_record(
        &self,
        decision: &RoutingDecision,
        primary: &GenerationResult,
        canary: &GenerationResult,
        waited: Duration,
        request: &GenerationRequest,
    ) {
        let (legacy_result, new_result) = match decision.engine {
            EngineKind::Legacy => (primary, canary),
            EngineKind::New => (canary, primary),
        };

        let comparison = self.comparator.compare(legacy_result, new_result);
        telemetry::record_canary_run(comparison.overall_match);

        if comparison.overall_match {
            debug!(
                routing_key = %request.routing_key,
                "canary comparison matched"
            );
        } else {
            warn!(
                routing_key = %request.routing_key,
                critical = comparison.critical.len(),
                "CANARY DISCREPANCY detected between legacy and pipeline output"
            );
            if self.config.snapshot().detailed_logging {
                for discrepancy in &comparison.critical {
                    warn!(
                        routing_key = %request.routing_key,
                        kind = %discrepancy.kind,
                        "CANARY DISCREPANCY [{}] {}",
                        discrepancy.kind,
                        discrepancy.message
                    );
                }
            }
            info!("canary comparison report:\n{}", comparison.report());
        }

        self.samples.record(PerformanceSample {
            legacy_time: legacy_result.execution_time,
            new_time: new_result.execution_time,
            canary_overhead: waited,
            sampled_at: self.clock.now(),
        });
    }

    fn settle(
        &self,
        decision: RoutingDecision,
        primary: Result<GenerationResult, EngineError>,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, EngineError> {
        if decision.engine == EngineKind::Legacy {
            return primary;
        }

        match primary {
            Ok(result) if result.success => {
                self.breaker.record_success();
                Ok(result)
            }
            Ok(result) => {
                let fallback = self.on_new_engine_failure(&failure_summary(&result), request);
                fallback.unwrap_or(Ok(result))
            }
            Err(e) => {
                let fallback = self.on_new_engine_failure(&e.to_string(), request);
                fallback.unwrap_or(Err(e))
            }
        }
    }

    /// Record the failure, persist a breaker trip, fire auto-rollback, and
    /// produce a fallback result when enabled.
    fn on_new_engine_failure(
        &self,
        summary: &str,
        request: &GenerationRequest,
    ) -> Option<Result<GenerationResult, EngineError>> {
        self.breaker.record_failure(summary);

        if self.breaker.phase() == BreakerPhase::Open {
            if let Err(e) = self.rollback.persist_current() {
                warn!(error = %e, "failed to persist breaker state");
            }
            if self.config.snapshot().auto_rollback_enabled
                && self.rollback.rollback_recommended().recommended
            {
                match self.rollback.execute_automatic_rollback(false) {
                    Ok(_) => info!("automatic rollback executed after breaker trip"),
                    Err(e) => warn!(error = %e, "automatic rollback refused"),
                }
            }
        }

        if !self.adapter_config.fallback_to_legacy_on_error {
            return None;
        }

        warn!(
            routing_key = %request.routing_key,
            error = %summary,
            "pipeline engine failed, falling back to legacy engine"
        );
        let started = Instant::now();
        let fallback = self.legacy_engine.execute(request);
        telemetry::record_engine_latency("legacy", started.elapsed().as_millis() as u64);
        Some(fallback)
    }
}

fn failure_summary(result: &GenerationResult) -> String {
    if result.errors.is_empty() {
        "pipeline engine returned a failed result".to_string()
    } else {
        result.errors.join("; ")
    }
}
