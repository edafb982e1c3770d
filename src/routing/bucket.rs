// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bucket allocation for day-sticky traffic splitting.

use std::hash::{DefaultHasher, Hash, Hasher};

/// Bucket assigned to requests with an empty routing key, so that
/// unspecified requests receive the canonical split.
pub const EMPTY_KEY_BUCKET: u8 = 50;

/// Salt mixed into canary sampling so the canary population is independent
/// of the engine-selection population.
const CANARY_SALT: &str = "canary";

/// Hash a routing key to a bucket in `[0, 100)`.
///
/// The day epoch is mixed in so the same key resolves the same way for a
/// full UTC day, rotating at midnight.
pub fn key_bucket(routing_key: &str, day_epoch: i64) -> u8 {
    if routing_key.is_empty() {
        return EMPTY_KEY_BUCKET;
    }
    let mut hasher = DefaultHasher::new();
    routing_key.hash(&mut hasher);
    day_epoch.hash(&mut hasher);
    (hasher.finish() % 100) as u8
}

/// Hash a routing key to the canary sampling bucket in `[0, 100)`.
pub fn canary_bucket(routing_key: &str, day_epoch: i64) -> u8 {
    let mut hasher = DefaultHasher::new();
    routing_key.hash(&mut hasher);
    CANARY_SALT.hash(&mut hasher);
    day_epoch.hash(&mut hasher);
    (hasher.finish() % 100) as u8
}
