//! Metrics collection for the migration control plane.
//!
//! Defines counters and histograms for routing, canary, breaker, and
//! rollback monitoring. Uses the `metrics` facade - no network exporters.

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Initialize metric descriptions.
///
/// Call once at startup to register metric metadata.
pub fn init_metrics() {
    // Routing counters
    describe_counter!("migration_requests_total", "Total generation requests routed");
    describe_counter!(
        "migration_requests_by_engine",
        "Generation requests per engine and route reason"
    );

    // Canary counters
    describe_counter!("migration_canary_runs_total", "Canary dual-executions performed");
    describe_counter!(
        "migration_canary_mismatches_total",
        "Canary comparisons with critical discrepancies"
    );
    describe_counter!(
        "migration_canary_timeouts_total",
        "Canary runs abandoned on timeout"
    );

    // Breaker and rollback counters
    describe_counter!(
        "migration_breaker_transitions_total",
        "Circuit breaker phase transitions"
    );
    describe_counter!("migration_rollbacks_total", "Rollback executions by trigger");

    // Latency histograms
    describe_histogram!(
        "migration_engine_latency_ms",
        "Engine execution latency in milliseconds"
    );
}

/// Record a routed request.
pub fn record_request(engine: &str, reason: &str) {
    counter!("migration_requests_total").increment(1);
    counter!(
        "migration_requests_by_engine",
        "engine" => engine.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a completed canary dual-execution.
pub fn record_canary_run(matched: bool) {
    counter!("migration_canary_runs_total").increment(1);
    if !matched {
        counter!("migration_canary_mismatches_total").increment(1);
    }
}

/// Record a canary abandoned on timeout.
pub fn record_canary_timeout() {
    counter!("migration_canary_timeouts_total").increment(1);
}

/// Record a circuit breaker phase transition.
pub fn record_breaker_transition(from: &str, to: &str) {
    counter!(
        "migration_breaker_transitions_total",
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

/// Record a rollback execution.
pub fn record_rollback(trigger: &str, succeeded: bool) {
    counter!(
        "migration_rollbacks_total",
        "trigger" => trigger.to_string(),
        "succeeded" => succeeded.to_string()
    )
    .increment(1);
}

/// Record engine execution latency.
pub fn record_engine_latency(engine: &str, latency_ms: u64) {
    histogram!("migration_engine_latency_ms", "engine" => engine.to_string())
        .record(latency_ms as f64);
}
