// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Circuit breaker protecting the pipeline engine.
//!
//! Three-state machine: `closed -> open` when the sliding-window failure
//! count crosses the threshold, `open -> half_open` once the recovery
//! timeout elapses, `half_open -> closed` on a probe success and
//! `half_open -> open` on a probe failure.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::routing::ConfigHandle;
use crate::telemetry;

/// Breaker phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerPhase {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerPhase::Closed => write!(f, "closed"),
            BreakerPhase::Open => write!(f, "open"),
            BreakerPhase::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// One recorded failure of the pipeline engine.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
    /// Short description of the failure.
    pub error_summary: String,
}

#[derive(Debug, Default)]
struct BreakerInner {
    phase: BreakerPhase,
    error_events: VecDeque<ErrorEvent>,
    opened_at: Option<DateTime<Utc>>,
    last_probe_at: Option<DateTime<Utc>>,
}

/// Sliding-window circuit breaker.
///
/// All transitions are serialized by an internal lock; observers may see any
/// point-in-time phase but never torn fields.
pub struct CircuitBreaker {
    config: Arc<ConfigHandle>,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker with no recorded events.
    pub fn new(config: Arc<ConfigHandle>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> BreakerPhase {
        self.inner.lock().phase
    }

    /// When the breaker last opened, if it is open or half-open.
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().opened_at
    }

    /// Number of failures currently inside the window.
    pub fn error_count(&self) -> usize {
        self.inner.lock().error_events.len()
    }

    /// When the pipeline engine was last probed from `open` or `half_open`.
    pub fn last_probe_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_probe_at
    }

    /// Record a successful pipeline-engine run.
    ///
    /// In `half_open` this is the probe succeeding: the breaker closes and
    /// clears its events. In `closed` it is a no-op.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.phase == BreakerPhase::HalfOpen {
            inner.phase = BreakerPhase::Closed;
            inner.error_events.clear();
            inner.opened_at = None;
            drop(inner);
            debug!("circuit breaker closed after successful probe");
            telemetry::record_breaker_transition("half_open", "closed");
        }
    }

    /// Record a failed pipeline-engine run.
    pub fn record_failure(&self, error_summary: &str) {
        // Lock order: config snapshot before the breaker lock.
        let config = self.config.snapshot();
        let now = self.clock.now();

        let mut inner = self.inner.lock();
        inner.error_events.push_back(ErrorEvent {
            timestamp: now,
            error_summary: error_summary.to_string(),
        });
        prune_window(&mut inner.error_events, now, config.error_window);

        // Hard cap regardless of window width.
        let cap = (config.error_threshold as usize).saturating_mul(4);
        while inner.error_events.len() > cap {
            inner.error_events.pop_front();
        }

        match inner.phase {
            BreakerPhase::Closed => {
                if inner.error_events.len() >= config.error_threshold as usize {
                    inner.phase = BreakerPhase::Open;
                    inner.opened_at = Some(now);
                    let count = inner.error_events.len();
                    drop(inner);
                    warn!(
                        failures = count,
                        threshold = config.error_threshold,
                        "circuit breaker opened: pipeline engine failure threshold crossed"
                    );
                    telemetry::record_breaker_transition("closed", "open");
                }
            }
            BreakerPhase::HalfOpen => {
                // Probe failure reopens immediately with a fresh dwell time.
                inner.phase = BreakerPhase::Open;
                inner.opened_at = Some(now);
                drop(inner);
                warn!("circuit breaker reopened: recovery probe failed");
                telemetry::record_breaker_transition("half_open", "open");
            }
            BreakerPhase::Open => {}
        }
    }

    /// Whether the pipeline engine may be used right now.
    ///
    /// In `open`, once the recovery timeout has elapsed this call transitions
    /// to `half_open` and returns true - the caller is the probe.
    pub fn allow_new_engine(&self) -> bool {
        let config = self.config.snapshot();
        let now = self.clock.now();

        let mut inner = self.inner.lock();
        match inner.phase {
            BreakerPhase::Closed => true,
            BreakerPhase::HalfOpen => {
                inner.last_probe_at = Some(now);
                true
            }
            BreakerPhase::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|opened| now.signed_duration_since(opened))
                    .and_then(|d| d.to_std().ok());
                match elapsed {
                    Some(elapsed) if elapsed >= config.recovery_timeout => {
                        inner.phase = BreakerPhase::HalfOpen;
                        inner.last_probe_at = Some(now);
                        drop(inner);
                        debug!("circuit breaker half-open: recovery timeout elapsed");
                        telemetry::record_breaker_transition("open", "half_open");
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    /// Force the breaker open, denying the pipeline engine until reset or
    /// recovery. Used by rollback.
    pub fn force_open(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let from = inner.phase;
        inner.phase = BreakerPhase::Open;
        inner.opened_at = Some(now);
        drop(inner);
        if from != BreakerPhase::Open {
            telemetry::record_breaker_transition(&from.to_string(), "open");
        }
    }

    /// Reset to closed and clear all recorded events.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let from = inner.phase;
        *inner = BreakerInner::default();
        drop(inner);
        if from != BreakerPhase::Closed {
            telemetry::record_breaker_transition(&from.to_string(), "closed");
        }
    }

    /// Restore phase from a persisted snapshot. Events are transient and are
    /// not restored.
    pub fn restore(&self, phase: BreakerPhase, opened_at: Option<DateTime<Utc>>) {
        let mut inner = self.inner.lock();
        inner.phase = phase;
        inner.opened_at = match phase {
            BreakerPhase::Closed => None,
            // An open snapshot without a timestamp restarts its dwell now.
            _ => opened_at.or_else(|| Some(self.clock.now())),
        };
    }
}

fn prune_window(events: &mut VecDeque<ErrorEvent>, now: DateTime<Utc>, window: Duration) {
    while let Some(front) = events.front() {
        let age = now.signed_duration_since(front.timestamp).to_std();
        match age {
            Ok(age) if age > window => {
                events.pop_front();
            }
            // In-window, or a future timestamp after a clock step backwards.
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::routing::FeatureFlagConfig;

    fn breaker_with(
        threshold: u32,
        window: Duration,
        recovery: Duration,
    ) -> (CircuitBreaker, Arc<ManualClock>) {
        let config = FeatureFlagConfig {
            error_threshold: threshold,
            error_window: window,
            recovery_timeout: recovery,
            ..FeatureFlagConfig::default()
        };
        let handle = Arc::new(ConfigHandle::new(config).unwrap());
        let clock = Arc::new(ManualClock::fixed());
        let breaker = CircuitBreaker::new(handle, clock.clone());
        (breaker, clock)
    }

    #[test]
    fn test_starts_closed_and_allows() {
        let (breaker, _clock) = breaker_with(5, Duration::from_secs(300), Duration::from_secs(600));
        assert_eq!(breaker.phase(), BreakerPhase::Closed);
        assert!(breaker.allow_new_engine());
        assert_eq!(breaker.error_count(), 0);
    }

    #[test]
    fn test_trips_at_threshold() {
        let (breaker, _clock) = breaker_with(3, Duration::from_secs(300), Duration::from_secs(600));

        breaker.record_failure("boom 1");
        breaker.record_failure("boom 2");
        assert_eq!(breaker.phase(), BreakerPhase::Closed);

        breaker.record_failure("boom 3");
        assert_eq!(breaker.phase(), BreakerPhase::Open);
        assert!(breaker.opened_at().is_some());
        assert!(!breaker.allow_new_engine());
    }

    #[test]
    fn test_window_pruning() {
        let (breaker, clock) = breaker_with(3, Duration::from_secs(60), Duration::from_secs(600));

        breaker.record_failure("old");
        clock.advance(Duration::from_secs(61));
        breaker.record_failure("fresh 1");
        breaker.record_failure("fresh 2");

        // The first failure aged out, so the threshold of 3 is not reached.
        assert_eq!(breaker.error_count(), 2);
        assert_eq!(breaker.phase(), BreakerPhase::Closed);
    }

    #[test]
    fn test_event_cap_at_four_times_threshold() {
        let (breaker, _clock) = breaker_with(2, Duration::from_secs(3600), Duration::from_secs(600));
        for i in 0..20 {
            breaker.record_failure(&format!("boom {}", i));
        }
        assert!(breaker.error_count() <= 8);
    }

    #[test]
    fn test_recovery_probe_flow_success() {
        let (breaker, clock) =
            breaker_with(1, Duration::from_secs(300), Duration::from_millis(100));

        breaker.record_failure("boom");
        assert_eq!(breaker.phase(), BreakerPhase::Open);
        assert!(!breaker.allow_new_engine());

        clock.advance(Duration::from_millis(101));
        assert!(breaker.allow_new_engine());
        assert_eq!(breaker.phase(), BreakerPhase::HalfOpen);
        assert_eq!(breaker.last_probe_at(), Some(clock.now()));

        breaker.record_success();
        assert_eq!(breaker.phase(), BreakerPhase::Closed);
        assert_eq!(breaker.error_count(), 0);
        assert!(breaker.opened_at().is_none());
    }

    #[test]
    fn test_recovery_probe_flow_failure() {
        let (breaker, clock) =
            breaker_with(1, Duration::from_secs(300), Duration::from_millis(100));

        breaker.record_failure("boom");
        let first_opened = breaker.opened_at().unwrap();

        clock.advance(Duration::from_millis(101));
        assert!(breaker.allow_new_engine());
        assert_eq!(breaker.phase(), BreakerPhase::HalfOpen);

        clock.advance(Duration::from_millis(5));
        breaker.record_failure("probe failed");
        assert_eq!(breaker.phase(), BreakerPhase::Open);
        assert!(breaker.opened_at().unwrap() > first_opened);
    }

    #[test]
    fn test_success_in_closed_is_noop() {
        let (breaker, _clock) = breaker_with(3, Duration::from_secs(300), Duration::from_secs(600));
        breaker.record_failure("boom");
        breaker.record_success();
        // Closed-phase successes do not clear the window.
        assert_eq!(breaker.error_count(), 1);
        assert_eq!(breaker.phase(), BreakerPhase::Closed);
    }

    #[test]
    fn test_force_open_and_reset() {
        let (breaker, _clock) = breaker_with(5, Duration::from_secs(300), Duration::from_secs(600));

        breaker.force_open();
        assert_eq!(breaker.phase(), BreakerPhase::Open);
        assert!(!breaker.allow_new_engine());

        breaker.reset();
        assert_eq!(breaker.phase(), BreakerPhase::Closed);
        assert_eq!(breaker.error_count(), 0);
        assert!(breaker.allow_new_engine());
    }

    #[test]
    fn test_clock_moving_backwards_accepted() {
        let (breaker, clock) = breaker_with(2, Duration::from_secs(60), Duration::from_secs(600));

        breaker.record_failure("boom 1");
        clock.set(clock.now() - chrono::Duration::hours(1));
        breaker.record_failure("boom 2");

        // Both events retained even though the second is "older".
        assert_eq!(breaker.error_count(), 2);
        assert_eq!(breaker.phase(), BreakerPhase::Open);
    }

    #[test]
    fn test_restore_open_without_timestamp() {
        let (breaker, clock) = breaker_with(5, Duration::from_secs(300), Duration::from_secs(600));
        breaker.restore(BreakerPhase::Open, None);
        assert_eq!(breaker.phase(), BreakerPhase::Open);
        assert_eq!(breaker.opened_at(), Some(clock.now()));
    }

    #[test]
    fn test_restore_closed_clears_opened_at() {
        let (breaker, _clock) = breaker_with(1, Duration::from_secs(300), Duration::from_secs(600));
        breaker.record_failure("boom");
        breaker.restore(BreakerPhase::Closed, None);
        assert_eq!(breaker.phase(), BreakerPhase::Closed);
        assert!(breaker.opened_at().is_none());
    }
}
