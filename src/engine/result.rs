// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Result values returned by generation engines.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One generated model as reported by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Source table name.
    pub table_name: String,
    /// TypeScript class name (e.g. `UserProfile`).
    pub class_name: String,
    /// Kebab-case file stem (e.g. `user-profile`).
    pub kebab_name: String,
    /// Number of files emitted for this model.
    pub file_count: usize,
}

/// One generated file with its full content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Path relative to the generation root.
    pub path: String,
    /// Full file content.
    pub content: String,
}

impl GeneratedFile {
    /// Create a generated file.
    pub fn new(path: &str, content: &str) -> Self {
        Self {
            path: path.to_string(),
            content: content.to_string(),
        }
    }
}

/// Run statistics reported by an engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStatistics {
    pub models_generated: usize,
    pub files_created: usize,
    pub peak_memory_mb: f64,
    pub pipeline_stages: usize,
}

/// The complete output of one engine run.
///
/// Returned by value from the engine; the adapter takes exclusive ownership
/// thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Whether the run completed successfully.
    pub success: bool,
    /// Monotonic execution duration.
    pub execution_time: Duration,
    /// Generated model descriptors, in emission order.
    pub generated_models: Vec<ModelDescriptor>,
    /// Generated files, in emission order.
    pub generated_files: Vec<GeneratedFile>,
    /// Human-readable error messages.
    pub errors: Vec<String>,
    /// Run statistics.
    pub statistics: GenerationStatistics,
}

impl GenerationResult {
    /// Build a failed result with no output, the user-visible shape for a
    /// request that cannot be served.
    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            success: false,
            execution_time: Duration::ZERO,
            generated_models: Vec::new(),
            generated_files: Vec::new(),
            errors,
            statistics: GenerationStatistics::default(),
        }
    }

    /// Number of generated models.
    pub fn model_count(&self) -> usize {
        self.generated_models.len()
    }

    /// Number of generated files.
    pub fn file_count(&self) -> usize {
        self.generated_files.len()
    }

    /// Find a generated file by path.
    pub fn find_file(&self, path: &str) -> Option<&GeneratedFile> {
        self.generated_files.iter().find(|f| f.path == path)
    }
}
