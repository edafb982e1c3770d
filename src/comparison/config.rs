// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Comparison tolerances.

use serde::{Deserialize, Serialize};

/// Tolerances applied when comparing legacy and pipeline outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Allowed difference in model counts before a critical discrepancy.
    pub acceptable_model_count_difference: usize,
    /// Allowed difference in file counts before a critical discrepancy.
    pub acceptable_file_count_difference: usize,
    /// Files larger than this are compared by size only.
    pub max_file_size_for_content_comparison: usize,
    /// Collapse whitespace runs before comparing content.
    pub ignore_whitespace_differences: bool,
    /// Strip ISO-8601 timestamps and generator comments before comparing.
    pub ignore_timestamp_differences: bool,
    /// Absolute slowdown below which no regression is reported.
    pub performance_tolerance_ms: u64,
    /// Relative slowdown ratio above which a regression is reported.
    pub performance_regression_threshold: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            acceptable_model_count_difference: 0,
            acceptable_file_count_difference: 0,
            max_file_size_for_content_comparison: 1024 * 1024,
            ignore_whitespace_differences: false,
            ignore_timestamp_differences: false,
            performance_tolerance_ms: 500,
            performance_regression_threshold: 1.2,
        }
    }
}

impl ComparisonConfig {
    /// Tolerant comparison for outputs that differ only in formatting and
    /// generation timestamps.
    pub fn tolerant() -> Self {
        Self {
            ignore_whitespace_differences: true,
            ignore_timestamp_differences: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ComparisonConfig::default();
        assert_eq!(config.acceptable_model_count_difference, 0);
        assert_eq!(config.acceptable_file_count_difference, 0);
        assert_eq!(config.max_file_size_for_content_comparison, 1024 * 1024);
        assert!(!config.ignore_whitespace_differences);
        assert!((config.performance_regression_threshold - 1.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tolerant_enables_normalization() {
        let config = ComparisonConfig::tolerant();
        assert!(config.ignore_whitespace_differences);
        assert!(config.ignore_timestamp_differences);
    }
}
