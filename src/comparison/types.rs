// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Comparison result values.

use serde::{Deserialize, Serialize};

/// Discrepancy severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// What kind of difference was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    SuccessStatus,
    ModelCount,
    FileCount,
    ModelStructure,
    ModelMissing,
    FileContent,
    FileMissing,
    PerformanceRegression,
    ComparisonError,
}

impl std::fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscrepancyKind::SuccessStatus => write!(f, "success_status"),
            DiscrepancyKind::ModelCount => write!(f, "model_count"),
            DiscrepancyKind::FileCount => write!(f, "file_count"),
            DiscrepancyKind::ModelStructure => write!(f, "model_structure"),
            DiscrepancyKind::ModelMissing => write!(f, "model_missing"),
            DiscrepancyKind::FileContent => write!(f, "file_content"),
            DiscrepancyKind::FileMissing => write!(f, "file_missing"),
            DiscrepancyKind::PerformanceRegression => write!(f, "performance_regression"),
            DiscrepancyKind::ComparisonError => write!(f, "comparison_error"),
        }
    }
}

/// A named difference between two generation results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    pub severity: Severity,
    pub kind: DiscrepancyKind,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Discrepancy {
    pub fn critical(kind: DiscrepancyKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Critical,
            kind,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn warning(kind: DiscrepancyKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn info(kind: DiscrepancyKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            kind,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// How a pair of files compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    /// Content (or size, for oversized files) matched.
    Match,
    /// Content differed after normalization.
    ContentMismatch,
    /// Oversized files differed in size.
    SizeMismatch,
    /// Present only in the legacy output.
    LegacyOnly,
    /// Present only in the pipeline output.
    NewOnly,
}

impl std::fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOutcome::Match => write!(f, "match"),
            FileOutcome::ContentMismatch => write!(f, "content_mismatch"),
            FileOutcome::SizeMismatch => write!(f, "size_mismatch"),
            FileOutcome::LegacyOnly => write!(f, "legacy_only"),
            FileOutcome::NewOnly => write!(f, "new_only"),
        }
    }
}

/// Per-file comparison record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileComparison {
    pub path: String,
    pub outcome: FileOutcome,
    /// True when the size gate skipped content comparison.
    pub size_only: bool,
}

impl FileComparison {
    pub fn matched(&self) -> bool {
        self.outcome == FileOutcome::Match
    }
}

/// Per-model comparison record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub table_name: String,
    pub matched: bool,
    /// Names of descriptor fields that differed.
    #[serde(default)]
    pub mismatched_fields: Vec<String>,
}

/// Execution-time comparison of the two runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceAnalysis {
    pub legacy_ms: u64,
    pub new_ms: u64,
    /// `new_ms - legacy_ms`; negative when the pipeline engine was faster.
    pub delta_ms: i64,
    /// `new_ms / legacy_ms`.
    pub ratio: f64,
    pub regression: bool,
}

/// Full result of one canary comparison. Transient: produced per canary,
/// logged, and discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub overall_match: bool,
    pub critical: Vec<Discrepancy>,
    pub warning: Vec<Discrepancy>,
    pub info: Vec<Discrepancy>,
    pub file_comparisons: Vec<FileComparison>,
    pub model_comparisons: Vec<ModelComparison>,
    pub performance: PerformanceAnalysis,
}

impl ComparisonResult {
    /// Render the deterministic text report.
    pub fn report(&self) -> String {
        super::report::render(self)
    }
}
