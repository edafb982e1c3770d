// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pluggable clock for routing epochs and breaker timing.
//!
//! Routing stickiness and breaker recovery both depend on wall-clock time;
//! components take an injected `Clock` so tests can drive time explicitly.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

/// Seconds per UTC day, used for the routing day epoch.
const SECONDS_PER_DAY: i64 = 86_400;

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Day epoch for sticky routing: days since the Unix epoch, rotating
    /// at UTC midnight.
    fn day_epoch(&self) -> i64 {
        self.now().timestamp().div_euclid(SECONDS_PER_DAY)
    }
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at the given instant.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Create a clock frozen at a fixed mid-day reference point.
    pub fn fixed() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 3, 14, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::new(start)
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
    }

    /// Set the clock to an absolute instant. Moving backwards is allowed.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
