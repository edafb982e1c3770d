// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Output comparison for canary dual-execution.
//!
//! Consumes the legacy and pipeline results for the same request and
//! produces a classified discrepancy report with structural checks, content
//! diffing under configurable tolerances, and performance analysis.

mod config;
mod normalize;
pub mod report;
mod types;

pub use config::ComparisonConfig;
pub use normalize::{digest, ContentNormalizer};
pub use types::{
    ComparisonResult, Discrepancy, DiscrepancyKind, FileComparison, FileOutcome, ModelComparison,
    PerformanceAnalysis, Severity,
};

use std::collections::BTreeMap;

use crate::engine::{GeneratedFile, GenerationResult, ModelDescriptor};

/// Compares legacy and pipeline generation results.
pub struct OutputComparator {
    config: ComparisonConfig,
    normalizer: ContentNormalizer,
}

impl OutputComparator {
    pub fn new(config: ComparisonConfig) -> Self {
        Self {
            config,
            normalizer: ContentNormalizer::new(),
        }
    }

    /// Active tolerances.
    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    /// Compare two results.
    ///
    /// Never fails: internal comparison errors become a critical
    /// `comparison_error` discrepancy with `overall_match == false`.
    pub fn compare(&self, legacy: &GenerationResult, new: &GenerationResult) -> ComparisonResult {
        match self.compare_inner(legacy, new) {
            Ok(result) => result,
            Err(message) => ComparisonResult {
                overall_match: false,
                critical: vec![Discrepancy::critical(
                    DiscrepancyKind::ComparisonError,
                    format!("comparison failed: {}", message),
                )],
                warning: Vec::new(),
                info: Vec::new(),
                file_comparisons: Vec::new(),
                model_comparisons: Vec::new(),
                performance: PerformanceAnalysis::default(),
            },
        }
    }

    fn compare_inner(
        &self,
        legacy: &GenerationResult,
        new: &GenerationResult,
    ) -> Result<ComparisonResult, String> {
        let mut critical = Vec::new();
        let mut warning = Vec::new();
        let mut info = Vec::new();

        if legacy.success != new.success {
            critical.push(
                Discrepancy::critical(
                    DiscrepancyKind::SuccessStatus,
                    format!(
                        "success status mismatch: legacy={}, new={}",
                        legacy.success, new.success
                    ),
                )
                .with_details(serde_json::json!({
                    "legacy_errors": legacy.errors,
                    "new_errors": new.errors,
                })),
            );
        }

        let model_delta = legacy.model_count().abs_diff(new.model_count());
        if model_delta > self.config.acceptable_model_count_difference {
            critical.push(Discrepancy::critical(
                DiscrepancyKind::ModelCount,
                format!(
                    "model count mismatch: legacy={}, new={}",
                    legacy.model_count(),
                    new.model_count()
                ),
            ));
        }

        let file_delta = legacy.file_count().abs_diff(new.file_count());
        if file_delta > self.config.acceptable_file_count_difference {
            critical.push(Discrepancy::critical(
                DiscrepancyKind::FileCount,
                format!(
                    "file count mismatch: legacy={}, new={}",
                    legacy.file_count(),
                    new.file_count()
                ),
            ));
        }

        let model_comparisons =
            self.compare_models(legacy, new, &mut critical)?;
        let file_comparisons = self.compare_files(legacy, new, &mut critical)?;
        let performance = self.analyze_performance(legacy, new, &mut warning, &mut info);

        Ok(ComparisonResult {
            overall_match: critical.is_empty(),
            critical,
            warning,
            info,
            file_comparisons,
            model_comparisons,
            performance,
        })
    }

    fn compare_models(
        &self,
        legacy: &GenerationResult,
        new: &GenerationResult,
        critical: &mut Vec<Discrepancy>,
    ) -> Result<Vec<ModelComparison>, String> {
        let legacy_models = index_models(&legacy.generated_models, "legacy")?;
        let new_models = index_models(&new.generated_models, "new")?;
        let mut comparisons = Vec::new();

        for (table, legacy_model) in &legacy_models {
            match new_models.get(table) {
                Some(new_model) => {
                    let mut mismatched = Vec::new();
                    if legacy_model.class_name != new_model.class_name {
                        mismatched.push("class_name".to_string());
                    }
                    if legacy_model.kebab_name != new_model.kebab_name {
                        mismatched.push("kebab_name".to_string());
                    }
                    if legacy_model.file_count != new_model.file_count {
                        mismatched.push("file_count".to_string());
                    }
                    if !mismatched.is_empty() {
                        critical.push(
                            Discrepancy::critical(
                                DiscrepancyKind::ModelStructure,
                                format!(
                                    "model structure mismatch for {}: {}",
                                    table,
                                    mismatched.join(", ")
                                ),
                            )
                            .with_details(serde_json::json!({
                                "table": table,
                                "legacy": legacy_model,
                                "new": new_model,
                            })),
                        );
                    }
                    comparisons.push(ModelComparison {
                        table_name: table.clone(),
                        matched: mismatched.is_empty(),
                        mismatched_fields: mismatched,
                    });
                }
                None => {
                    critical.push(Discrepancy::critical(
                        DiscrepancyKind::ModelMissing,
                        format!("model {} missing from new output", table),
                    ));
                    comparisons.push(ModelComparison {
                        table_name: table.clone(),
                        matched: false,
                        mismatched_fields: vec!["missing_in_new".to_string()],
                    });
                }
            }
        }

        for table in new_models.keys() {
            if !legacy_models.contains_key(table) {
                critical.push(Discrepancy::critical(
                    DiscrepancyKind::ModelMissing,
                    format!("model {} missing from legacy output", table),
                ));
                comparisons.push(ModelComparison {
                    table_name: table.clone(),
                    matched: false,
                    mismatched_fields: vec!["missing_in_legacy".to_string()],
                });
            }
        }

        Ok(comparisons)
    }

    fn compare_files(
        &self,
        legacy: &GenerationResult,
        new: &GenerationResult,
        critical: &mut Vec<Discrepancy>,
    ) -> Result<Vec<FileComparison>, String> {
        let legacy_files = index_files(&legacy.generated_files, "legacy")?;
        let new_files = index_files(&new.generated_files, "new")?;
        let mut comparisons = Vec::new();

        for (path, legacy_file) in &legacy_files {
            match new_files.get(path) {
                Some(new_file) => {
                    comparisons.push(self.compare_file_pair(path, legacy_file, new_file, critical));
                }
                None => {
                    critical.push(Discrepancy::critical(
                        DiscrepancyKind::FileMissing,
                        format!("file {} present only in legacy output", path),
                    ));
                    comparisons.push(FileComparison {
                        path: path.clone(),
                        outcome: FileOutcome::LegacyOnly,
                        size_only: false,
                    });
                }
            }
        }

        for path in new_files.keys() {
            if !legacy_files.contains_key(path) {
                critical.push(Discrepancy::critical(
                    DiscrepancyKind::FileMissing,
                    format!("file {} present only in new output", path),
                ));
                comparisons.push(FileComparison {
                    path: path.clone(),
                    outcome: FileOutcome::NewOnly,
                    size_only: false,
                });
            }
        }

        // Map iteration already yields legacy-side paths sorted; new-only
        // entries land at the end, so sort once for a stable report order.
        comparisons.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(comparisons)
    }

    fn compare_file_pair(
        &self,
        path: &str,
        legacy: &GeneratedFile,
        new: &GeneratedFile,
        critical: &mut Vec<Discrepancy>,
    ) -> FileComparison {
        let max = self.config.max_file_size_for_content_comparison;
        if legacy.content.len() > max || new.content.len() > max {
            // Oversized: sizes must match exactly.
            if legacy.content.len() == new.content.len() {
                return FileComparison {
                    path: path.to_string(),
                    outcome: FileOutcome::Match,
                    size_only: true,
                };
            }
            critical.push(
                Discrepancy::critical(
                    DiscrepancyKind::FileContent,
                    format!("size mismatch for oversized file {}", path),
                )
                .with_details(serde_json::json!({
                    "path": path,
                    "legacy_bytes": legacy.content.len(),
                    "new_bytes": new.content.len(),
                })),
            );
            return FileComparison {
                path: path.to_string(),
                outcome: FileOutcome::SizeMismatch,
                size_only: true,
            };
        }

        let whitespace = self.config.ignore_whitespace_differences;
        let timestamps = self.config.ignore_timestamp_differences;
        let legacy_norm = self.normalizer.normalize(&legacy.content, whitespace, timestamps);
        let new_norm = self.normalizer.normalize(&new.content, whitespace, timestamps);

        if digest(&legacy_norm) == digest(&new_norm) {
            return FileComparison {
                path: path.to_string(),
                outcome: FileOutcome::Match,
                size_only: false,
            };
        }

        critical.push(
            Discrepancy::critical(
                DiscrepancyKind::FileContent,
                format!("content mismatch for {}", path),
            )
            .with_details(serde_json::json!({
                "path": path,
                "legacy_bytes": legacy.content.len(),
                "new_bytes": new.content.len(),
            })),
        );
        FileComparison {
            path: path.to_string(),
            outcome: FileOutcome::ContentMismatch,
            size_only: false,
        }
    }

    fn analyze_performance(
        &self,
        legacy: &GenerationResult,
        new: &GenerationResult,
        warning: &mut Vec<Discrepancy>,
        info: &mut Vec<Discrepancy>,
    ) -> PerformanceAnalysis {
        let legacy_ms = legacy.execution_time.as_millis() as u64;
        let new_ms = new.execution_time.as_millis() as u64;
        let delta_ms = new_ms as i64 - legacy_ms as i64;
        let ratio = new_ms as f64 / (legacy_ms.max(1)) as f64;

        let regression = delta_ms > self.config.performance_tolerance_ms as i64
            && ratio > self.config.performance_regression_threshold;

        let analysis = PerformanceAnalysis {
            legacy_ms,
            new_ms,
            delta_ms,
            ratio,
            regression,
        };

        if regression {
            warning.push(
                Discrepancy::warning(
                    DiscrepancyKind::PerformanceRegression,
                    format!(
                        "pipeline engine slower by {} ms ({:.2}x)",
                        delta_ms, ratio
                    ),
                )
                .with_details(serde_json::json!({
                    "legacy_ms": legacy_ms,
                    "new_ms": new_ms,
                })),
            );
        } else {
            info.push(Discrepancy::info(
                DiscrepancyKind::PerformanceRegression,
                format!(
                    "execution times: legacy {} ms, new {} ms",
                    legacy_ms, new_ms
                ),
            ));
        }

        analysis
    }
}

fn index_models<'a>(
    models: &'a [ModelDescriptor],
    side: &str,
) -> Result<BTreeMap<String, &'a ModelDescriptor>, String> {
    let mut map = BTreeMap::new();
    for model in models {
        if map.insert(model.table_name.clone(), model).is_some() {
            return Err(format!(
                "duplicate model descriptor for table {} in {} output",
                model.table_name, side
            ));
        }
    }
    Ok(map)
}

fn index_files<'a>(
    files: &'a [GeneratedFile],
    side: &str,
) -> Result<BTreeMap<String, &'a GeneratedFile>, String> {
    let mut map = BTreeMap::new();
    for file in files {
        if map.insert(file.path.clone(), file).is_some() {
            return Err(format!(
                "duplicate generated file {} in {} output",
                file.path, side
            ));
        }
    }
    Ok(map)
}
