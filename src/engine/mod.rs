// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Generation engine contract shared by the legacy and pipeline engines.
//!
//! The control plane never synthesizes output itself; it only routes between
//! two implementations of [`GenerationEngine`] and observes their results.

mod request;
mod result;

pub use request::GenerationRequest;
pub use result::{GeneratedFile, GenerationResult, GenerationStatistics, ModelDescriptor};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine execution errors.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("engine execution failed: {0}")]
    Execution(String),

    #[error("engine execution timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("engine denied: {0}")]
    Denied(String),
}

/// Which engine serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// The mature generation engine.
    Legacy,
    /// The newly engineered pipeline engine.
    New,
}

impl EngineKind {
    /// The opposite engine, used for canary dual-execution.
    pub fn other(self) -> Self {
        match self {
            EngineKind::Legacy => EngineKind::New,
            EngineKind::New => EngineKind::Legacy,
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Legacy => write!(f, "legacy"),
            EngineKind::New => write!(f, "new"),
        }
    }
}

/// A generation engine.
///
/// Implementations may return a failed result (`success == false`) or an
/// `Err`; the adapter treats both as failure. Engines must not mutate
/// external state other than the filesystem writes represented in
/// `generated_files`.
pub trait GenerationEngine: Send + Sync {
    /// Run generation for the given request.
    fn execute(&self, request: &GenerationRequest) -> Result<GenerationResult, EngineError>;
}
