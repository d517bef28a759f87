//! Output formatting - plaintext and JSON.

use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::builder::AnalysisResult;
use crate::diagnostic::Diagnostic;

/// SHA-256 over the ordered diagnostic sequence.
///
/// Two runs over the same design produce the same digest.
pub fn digest(diagnostics: &[Diagnostic]) -> String {
    let mut sha = Sha256::new();
    for d in diagnostics {
        sha.update(d.to_string().as_bytes());
        sha.update(b"\n");
    }
    format!("{:x}", sha.finalize())
}

/// Diagnostic counts keyed by code name.
pub fn count_by_code(diagnostics: &[Diagnostic]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for d in diagnostics {
        *counts.entry(d.code.name()).or_insert(0) += 1;
    }
    counts
}

/// Renders the plain text report: one line per diagnostic, then a summary.
pub fn render_plain(result: &AnalysisResult) -> String {
    let mut out = String::new();
    if result.diagnostics.is_empty() {
        out.push_str("No usage diagnostics.\n");
    } else {
        for d in &result.diagnostics {
            let _ = writeln!(out, "{}", d);
        }
        let _ = writeln!(out, "\n{} warning(s)", result.diagnostics.len());
    }
    if result.truncated {
        out.push_str("(output truncated by max_diagnostics)\n");
    }
    if !result.complete {
        out.push_str("(analysis cancelled; results are partial)\n");
    }
    out
}

/// Builds the JSON report value.
pub fn report_json(result: &AnalysisResult) -> serde_json::Value {
    json!({
        "diagnostics": result.diagnostics,
        "counts": count_by_code(&result.diagnostics),
        "complete": result.complete,
        "truncated": result.truncated,
        "stats": result.stats,
        "digest": digest(&result.diagnostics),
    })
}

/// Prints diagnostics in plain text format.
pub fn print_plain(result: &AnalysisResult) {
    print!("{}", render_plain(result));
}

/// Prints diagnostics in JSON format.
///
/// Falls back to one line per diagnostic if serialization fails.
pub fn print_json(result: &AnalysisResult) {
    match serde_json::to_string_pretty(&report_json(result)) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            tracing::warn!(error = %e, "JSON serialization failed");
            for d in &result.diagnostics {
                println!("{}", d);
            }
        }
    }
}
