// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Performance sample collection with a bounded ring buffer.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Maximum samples retained.
pub const MAX_SAMPLES: usize = 1000;

/// One dual-execution timing sample.
#[derive(Debug, Clone)]
pub struct PerformanceSample {
    pub legacy_time: Duration,
    pub new_time: Duration,
    /// Wall-clock time the adapter spent waiting on the canary beyond the
    /// primary engine.
    pub canary_overhead: Duration,
    pub sampled_at: DateTime<Utc>,
}

/// Aggregate view over the sample window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub samples: usize,
    pub avg_legacy_ms: f64,
    pub avg_new_ms: f64,
    pub avg_canary_overhead_ms: f64,
    /// Average new / average legacy; 0 when no samples exist.
    pub new_to_legacy_ratio: f64,
}

/// Ring buffer of recent dual-execution samples.
#[derive(Default)]
pub struct PerformanceTracker {
    samples: Mutex<VecDeque<PerformanceSample>>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample, evicting the oldest past the bound.
    pub fn record(&self, sample: PerformanceSample) {
        let mut samples = self.samples.lock();
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    /// Average legacy execution time, when samples exist.
    pub fn avg_legacy_time(&self) -> Option<Duration> {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return None;
        }
        let total: Duration = samples.iter().map(|s| s.legacy_time).sum();
        Some(total / samples.len() as u32)
    }

    /// Aggregate statistics over the window.
    pub fn summary(&self) -> PerformanceSummary {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return PerformanceSummary::default();
        }

        let count = samples.len() as f64;
        let avg_legacy_ms =
            samples.iter().map(|s| s.legacy_time.as_secs_f64() * 1000.0).sum::<f64>() / count;
        let avg_new_ms =
            samples.iter().map(|s| s.new_time.as_secs_f64() * 1000.0).sum::<f64>() / count;
        let avg_canary_overhead_ms = samples
            .iter()
            .map(|s| s.canary_overhead.as_secs_f64() * 1000.0)
            .sum::<f64>()
            / count;

        PerformanceSummary {
            samples: samples.len(),
            avg_legacy_ms,
            avg_new_ms,
            avg_canary_overhead_ms,
            new_to_legacy_ratio: if avg_legacy_ms > 0.0 {
                avg_new_ms / avg_legacy_ms
            } else {
                0.0
            },
        }
    }
}
