// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Content normalization and digesting for file comparison.

use regex::Regex;
use sha2::{Digest, Sha256};

/// Normalizes file content before comparison.
///
/// Timestamp stripping removes generator comments of the form
/// `Generated: <date> <time>` and any ISO-8601 timestamp substring, per
/// line. Whitespace normalization collapses all whitespace runs to a single
/// space and trims the ends.
pub struct ContentNormalizer {
    generated_re: Regex,
    timestamp_re: Regex,
}

impl ContentNormalizer {
    pub fn new() -> Self {
        // Hard-coded patterns; compilation cannot fail at runtime.
        let generated_re =
            Regex::new(r"Generated: \d{4}-\d{2}-\d{2} \d{2}:\d{2}(?::\d{2})?")
                .expect("generator comment pattern compiles");
        let timestamp_re = Regex::new(
            r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?",
        )
        .expect("timestamp pattern compiles");
        Self {
            generated_re,
            timestamp_re,
        }
    }

    /// Normalize content per the given flags.
    pub fn normalize(&self, content: &str, whitespace: bool, timestamps: bool) -> String {
        let content = if timestamps {
            let mut lines: Vec<String> = Vec::new();
            for line in content.lines() {
                let line = self.generated_re.replace_all(line, "");
                let line = self.timestamp_re.replace_all(&line, "");
                lines.push(line.into_owned());
            }
            lines.join("\n")
        } else {
            content.to_string()
        };

        if whitespace {
            content.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            content
        }
    }
}

impl Default for ContentNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 digest of content, hex encoded.
pub fn digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
