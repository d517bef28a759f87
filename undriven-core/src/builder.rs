//! Builder pattern API for usage analysis.
//!
//! Provides a fluent interface for configuring and running one analysis pass:
//!
//! ```rust,ignore
//! use undriven_core::prelude::*;
//!
//! let result = Analysis::new(&design)
//!     .script_mode(false)
//!     .parallel(true)
//!     .ignore_patterns(["^dbg_"])
//!     .run()?;
//!
//! for diag in &result.diagnostics {
//!     println!("{}", diag);
//! }
//! ```

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::Serialize;

use crate::alias::MemberIndex;
use crate::config::UndrivenConfig;
use crate::design::Design;
use crate::diagnostic::Diagnostic;
use crate::error::UndrivenResult;
use crate::policy::Policy;
use crate::traverse::{traverse, TraversalOutcome};

/// Caller-facing switches of one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Suppress the whole usage diagnostic category
    pub suppress_unused: bool,
    /// Script/REPL fragments: top-level port rules do not apply
    pub script_mode: bool,
    /// Traverse root scopes on the rayon pool
    pub parallel: bool,
    /// Keep only the first N diagnostics (in output order)
    pub max_diagnostics: Option<usize>,
    /// Regular expressions over declaration names to exempt
    pub ignore: Vec<String>,
}

/// Builder for configuring a usage analysis over one design.
///
/// # Example
///
/// ```rust,ignore
/// let result = Analysis::new(&design).max_diagnostics(10).run()?;
/// ```
#[derive(Debug, Clone)]
pub struct Analysis<'d> {
    design: &'d Design,
    options: AnalysisOptions,
    cancel: Arc<AtomicBool>,
}

impl<'d> Analysis<'d> {
    /// Create a new analysis builder for the given design.
    pub fn new(design: &'d Design) -> Self {
        Self {
            design,
            options: AnalysisOptions::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace all options at once.
    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    /// Apply settings from undriven.toml. Unset keys keep their current value.
    pub fn with_config(mut self, cfg: &UndrivenConfig) -> Self {
        if let Some(v) = cfg.suppress_unused {
            self.options.suppress_unused = v;
        }
        if let Some(v) = cfg.script_mode {
            self.options.script_mode = v;
        }
        if let Some(v) = cfg.parallel {
            self.options.parallel = v;
        }
        if let Some(v) = cfg.max_diagnostics {
            self.options.max_diagnostics = Some(v);
        }
        if let Some(patterns) = &cfg.ignore {
            self.options.ignore.extend(patterns.iter().cloned());
        }
        self
    }

    /// Suppress every usage diagnostic.
    pub fn suppress_unused(mut self, enabled: bool) -> Self {
        self.options.suppress_unused = enabled;
        self
    }

    /// Analyze script fragments (no top module rules).
    pub fn script_mode(mut self, enabled: bool) -> Self {
        self.options.script_mode = enabled;
        self
    }

    /// Traverse independent root subtrees in parallel.
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.options.parallel = enabled;
        self
    }

    /// Keep only the first `max` diagnostics.
    pub fn max_diagnostics(mut self, max: usize) -> Self {
        self.options.max_diagnostics = Some(max);
        self
    }

    /// Add patterns for declaration names to ignore.
    pub fn ignore_patterns(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options.ignore.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Share a cancellation flag with the caller. Setting it halts the
    /// traversal at the next scope boundary.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Run the analysis and return the ordered diagnostics.
    pub fn run(&self) -> UndrivenResult<AnalysisResult> {
        let design = self.design;
        let _span = tracing::info_span!(
            "analysis",
            decls = design.decls.len(),
            scopes = design.scopes.len(),
            roots = design.roots.len()
        )
        .entered();

        design.validate()?;

        if self.options.suppress_unused {
            tracing::info!("usage diagnostics suppressed");
            return Ok(AnalysisResult {
                diagnostics: Vec::new(),
                complete: true,
                truncated: false,
                stats: AnalysisStats {
                    declarations: design.decls.len(),
                    ..Default::default()
                },
            });
        }

        let policy = Policy::new(self.options.script_mode, &self.options.ignore)?;
        let index = MemberIndex::build(design);
        let outcome = traverse_design(design, &index, &self.cancel, self.options.parallel);
        if !outcome.complete {
            tracing::warn!("traversal was cancelled; only fully visited closed scopes are decided");
        }

        let mut diagnostics = policy.evaluate(design, &outcome.usage, outcome.complete);
        let mut truncated = false;
        if let Some(max) = self.options.max_diagnostics {
            if diagnostics.len() > max {
                diagnostics.truncate(max);
                truncated = true;
            }
        }

        let stats = AnalysisStats {
            declarations: design.decls.len(),
            registered: outcome.usage.order().len(),
            scopes: outcome.stats.scopes,
            statements: outcome.stats.statements,
            accesses: outcome.stats.accesses,
            unresolved: outcome.stats.unresolved,
            diagnostics: diagnostics.len(),
        };
        tracing::info!(
            diagnostics = stats.diagnostics,
            registered = stats.registered,
            scopes = stats.scopes,
            complete = outcome.complete,
            "analysis finished"
        );

        Ok(AnalysisResult {
            diagnostics,
            complete: outcome.complete,
            truncated,
            stats,
        })
    }
}

#[cfg(feature = "parallel")]
fn traverse_design(
    design: &Design,
    index: &MemberIndex,
    cancel: &Arc<AtomicBool>,
    parallel: bool,
) -> TraversalOutcome {
    if parallel {
        crate::traverse::traverse_parallel(design, index, cancel)
    } else {
        traverse(design, index, cancel)
    }
}

#[cfg(not(feature = "parallel"))]
fn traverse_design(
    design: &Design,
    index: &MemberIndex,
    cancel: &Arc<AtomicBool>,
    parallel: bool,
) -> TraversalOutcome {
    if parallel {
        tracing::warn!("built without the `parallel` feature; traversing sequentially");
    }
    traverse(design, index, cancel)
}

/// Counters describing one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    pub declarations: usize,
    /// Declarations the traversal reached
    pub registered: usize,
    pub scopes: usize,
    pub statements: usize,
    pub accesses: usize,
    pub unresolved: usize,
    pub diagnostics: usize,
}

/// Result of running usage analysis.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Diagnostics sorted by source location
    pub diagnostics: Vec<Diagnostic>,
    /// False when the run was cancelled
    pub complete: bool,
    /// True when `max_diagnostics` cut the list
    pub truncated: bool,
    pub stats: AnalysisStats,
}

impl AnalysisResult {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn codes(&self) -> Vec<crate::diagnostic::DiagCode> {
        self.diagnostics.iter().map(|d| d.code).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::*;
    use crate::diagnostic::DiagCode;
    use crate::error::UndrivenError;

    fn three_unused() -> Design {
        let mut b = DesignBuilder::new();
        let m = b.definition("m", DefinitionKind::Module, SourceLocation::new("b.sv", 1, 8));
        b.top(m);
        let body = b.instance_body(m, "m");
        b.root(body);
        for (i, name) in ["c", "a", "b"].iter().enumerate() {
            b.add_decl(
                body,
                Declaration::new(*name, DeclKind::Variable, Container::Definition(m))
                    .with_location(SourceLocation::new("b.sv", 2 + i as u32, 9)),
            );
        }
        b.build().unwrap()
    }

    #[test]
    fn test_run_reports_in_location_order() {
        let design = three_unused();
        let result = Analysis::new(&design).run().unwrap();
        let names: Vec<_> = result.diagnostics.iter().map(|d| d.symbol.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert!(result.complete);
        assert_eq!(result.codes(), vec![DiagCode::UnusedVariable; 3]);
    }

    #[test]
    fn test_suppress_unused_skips_everything() {
        let design = three_unused();
        let result = Analysis::new(&design).suppress_unused(true).run().unwrap();
        assert!(!result.has_diagnostics());
        assert_eq!(result.stats.scopes, 0);
    }

    #[test]
    fn test_max_diagnostics_truncates() {
        let design = three_unused();
        let result = Analysis::new(&design).max_diagnostics(2).run().unwrap();
        assert_eq!(result.diagnostics.len(), 2);
        assert!(result.truncated);
    }

    #[test]
    fn test_ignore_patterns_from_builder() {
        let design = three_unused();
        let result = Analysis::new(&design).ignore_patterns(["^[ab]$"]).run().unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].symbol, "c");
    }

    #[test]
    fn test_config_overrides() {
        let design = three_unused();
        let cfg = UndrivenConfig {
            script_mode: Some(true),
            max_diagnostics: Some(1),
            ignore: Some(vec!["x".into()]),
            ..Default::default()
        };
        let analysis = Analysis::new(&design).with_config(&cfg);
        assert!(analysis.options().script_mode);
        assert_eq!(analysis.options().max_diagnostics, Some(1));
        assert_eq!(analysis.options().ignore, vec!["x".to_string()]);
    }

    #[test]
    fn test_invalid_design_is_rejected() {
        let mut design = three_unused();
        design.roots.push(ScopeId(99));
        let err = Analysis::new(&design).run().unwrap_err();
        assert!(matches!(err, UndrivenError::Design { .. }));
    }
}
