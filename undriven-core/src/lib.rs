//! undriven-core: usage and definite-assignment analysis for elaborated
//! hardware designs.
//!
//! Given an elaborated instance tree with bound statements and expressions,
//! this library finds declarations that are never used, never driven, set
//! but never read, or read but never assigned, and reports them as warnings.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use undriven_core::prelude::*;
//!
//! let design = load_design(Path::new("top.json"))?;
//! let result = Analysis::new(&design).script_mode(false).run()?;
//!
//! for diag in &result.diagnostics {
//!     println!("{}", diag);
//! }
//! ```
//!
//! # Pipeline
//!
//! ```text
//! Design ──▶ traverse ──▶ UsageTable ──▶ Policy ──▶ [Diagnostic] (sorted by location)
//!              │  ▲
//!              ▼  │
//!           classify ◀──▶ alias
//! ```
//!
//! # Module Organization
//!
//! - [`design`]: Elaborated design model and [`DesignBuilder`]
//! - [`usage`]: Per-declaration read/write counters
//! - [`alias`]: Handle, modport and clocking-block resolution
//! - [`classify`]: Access classification of expression occurrences
//! - [`traverse`]: Instance tree walk, sequential or parallel
//! - [`policy`]: Suppression rules and the diagnostic decision table
//! - [`builder`]: Fluent builder API for configuration
//! - [`load`]: Design file discovery and decoding
//! - [`hierarchy`]: Instantiation graph and DOT export
//! - [`error`]: Typed error handling
//!
//! # Cargo Features
//!
//! - `parallel` (default): Traverse root subtrees on the rayon pool
//! - `dot` (default): Graphviz export of the instantiation hierarchy

pub mod alias;
pub mod builder;
pub mod classify;
pub mod config;
pub mod design;
pub mod diagnostic;
pub mod error;
pub mod hierarchy;
pub mod load;
pub mod logging;
pub mod policy;
pub mod prelude;
pub mod report;
pub mod traverse;
pub mod usage;

// Error types
pub use error::{IoResultExt, UndrivenError, UndrivenResult};

// Builder API
pub use builder::{Analysis, AnalysisOptions, AnalysisResult, AnalysisStats};

// Design model
pub use design::{Design, DesignBuilder};

// Diagnostics
pub use diagnostic::{DiagCode, Diagnostic, Severity};

// Configuration
pub use config::{load_config, load_config_file, OutputConfig, UndrivenConfig, CONFIG_FILE};

// Loading
pub use load::{gather_design_files, load_all, load_design, load_designs, parse_design};

// Engine pieces
pub use alias::{AliasResolver, MemberIndex};
pub use policy::Policy;
pub use traverse::{traverse, AnalysisContext, TraversalOutcome, TraversalStats};
pub use usage::{UsageRecord, UsageTable};

#[cfg(feature = "parallel")]
pub use traverse::traverse_parallel;

// Hierarchy
pub use hierarchy::{build_hierarchy, reachable_definitions};
#[cfg(feature = "dot")]
pub use hierarchy::to_dot;

// Logging
pub use logging::{init_structured_logging, log_error, log_info, log_warn};

// Reporting
pub use report::{count_by_code, digest, print_json, print_plain, render_plain, report_json};
