// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deterministic text rendering of comparison results.
//!
//! Identical inputs yield byte-identical reports; the renderer never reads
//! the clock and iterates only over pre-sorted collections.

use std::fmt::Write;

use super::types::{ComparisonResult, Discrepancy};

/// Render the report with sections SUMMARY, CRITICAL, WARNING, PERFORMANCE,
/// and FILES.
pub fn render(result: &ComparisonResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== SUMMARY ===");
    let _ = writeln!(
        out,
        "overall: {}",
        if result.overall_match { "MATCH" } else { "MISMATCH" }
    );
    let _ = writeln!(
        out,
        "discrepancies: {} critical, {} warning, {} info",
        result.critical.len(),
        result.warning.len(),
        result.info.len()
    );
    let _ = writeln!(
        out,
        "compared: {} models, {} files",
        result.model_comparisons.len(),
        result.file_comparisons.len()
    );

    let _ = writeln!(out, "=== CRITICAL ===");
    render_discrepancies(&mut out, &result.critical);

    let _ = writeln!(out, "=== WARNING ===");
    render_discrepancies(&mut out, &result.warning);

    let _ = writeln!(out, "=== PERFORMANCE ===");
    let perf = &result.performance;
    let _ = writeln!(out, "legacy: {} ms", perf.legacy_ms);
    let _ = writeln!(out, "new: {} ms", perf.new_ms);
    let _ = writeln!(
        out,
        "delta: {} ms (ratio {:.2})",
        perf.delta_ms, perf.ratio
    );
    let _ = writeln!(
        out,
        "regression: {}",
        if perf.regression { "yes" } else { "no" }
    );

    let _ = writeln!(out, "=== FILES ===");
    if result.file_comparisons.is_empty() {
        let _ = writeln!(out, "(none)");
    } else {
        for file in &result.file_comparisons {
            let suffix = if file.size_only { " (size only)" } else { "" };
            let _ = writeln!(out, "{}: {}{}", file.path, file.outcome, suffix);
        }
    }

    out
}

fn render_discrepancies(out: &mut String, discrepancies: &[Discrepancy]) {
    if discrepancies.is_empty() {
        let _ = writeln!(out, "(none)");
        return;
    }
    for d in discrepancies {
        let _ = writeln!(out, "[{}] {}", d.kind, d.message);
    }
}
