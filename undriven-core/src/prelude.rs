//! Prelude module for convenient imports.
//!
//! Import commonly used types with a single line:
//!
//! ```rust,ignore
//! use undriven_core::prelude::*;
//! ```

// Errors
pub use crate::error::{UndrivenError, UndrivenResult};

// Design model
pub use crate::design::{
    DeclId, DeclKind, Declaration, Design, DesignBuilder, Expr, ScopeId, ScopeKind, SourceLocation,
    Stmt,
};

// Builder API
pub use crate::builder::{Analysis, AnalysisOptions, AnalysisResult};

// Diagnostics
pub use crate::diagnostic::{DiagCode, Diagnostic, Severity};

// Loading and configuration
pub use crate::config::{load_config, UndrivenConfig};
pub use crate::load::{gather_design_files, load_all, load_design};

// Reporting
pub use crate::report::{digest, print_json, print_plain};
