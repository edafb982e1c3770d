// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Request value passed to generation engines.

use std::collections::HashMap;

/// A single generation invocation.
///
/// The routing key is conventionally a table name; an empty key means
/// "all tables" and receives the canonical percentage split. Options are
/// passed through to engines untouched; the context map is consulted only
/// by routing policies.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Key used for hashing and forced-table rules.
    pub routing_key: String,
    /// Opaque engine options.
    pub options: HashMap<String, serde_json::Value>,
    /// Policy-only context.
    pub context: HashMap<String, serde_json::Value>,
}

impl GenerationRequest {
    /// Request generation for a single table.
    pub fn for_table(table: &str) -> Self {
        Self {
            routing_key: table.to_string(),
            ..Self::default()
        }
    }

    /// Request generation for all tables.
    pub fn all_tables() -> Self {
        Self::default()
    }

    /// Attach an engine option.
    pub fn with_option(mut self, key: &str, value: serde_json::Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }

    /// Attach policy context.
    pub fn with_context(mut self, key: &str, value: serde_json::Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_table() {
        let request = GenerationRequest::for_table("users");
        assert_eq!(request.routing_key, "users");
        assert!(request.options.is_empty());
    }

    #[test]
    fn test_all_tables_empty_key() {
        let request = GenerationRequest::all_tables();
        assert!(request.routing_key.is_empty());
    }

    #[test]
    fn test_with_option_and_context() {
        let request = GenerationRequest::for_table("posts")
            .with_option("dry_run", serde_json::json!(true))
            .with_context("initiator", serde_json::json!("ops"));

        assert_eq!(request.options.get("dry_run"), Some(&serde_json::json!(true)));
        assert_eq!(request.context.get("initiator"), Some(&serde_json::json!("ops")));
    }
}
