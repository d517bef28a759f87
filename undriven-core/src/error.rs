//! Typed error handling for undriven.
//!
//! The analysis itself never fails on a well-formed design: every user-facing
//! outcome is a warning diagnostic. Errors only arise at the edges, when a
//! design or configuration is read from disk or an option is malformed.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for undriven operations.
#[derive(Error, Debug)]
pub enum UndrivenError {
    /// I/O error when reading design or configuration files
    #[error("I/O error at {path}: {message}")]
    Io {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// A design file could not be decoded or violates the id contract
    #[error("Design error in {path}: {message}")]
    Design { path: PathBuf, message: String },

    /// Configuration file or option errors
    #[error("Config error: {message}")]
    Config { message: String },
}

impl UndrivenError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a design error.
    pub fn design(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Design {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Relabel a design error with the file it was read from.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::Design { message, .. } => Self::Design {
                path: path.into(),
                message,
            },
            other => other,
        }
    }

    /// Check if the batch can continue with the next design.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Design { .. } | Self::Io { .. })
    }

    /// Get the path associated with this error, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            Self::Design { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Convenience type alias for undriven results.
pub type UndrivenResult<T> = Result<T, UndrivenError>;

/// Extension trait for converting std::io::Error with path context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    fn with_path(self, path: impl Into<PathBuf>) -> UndrivenResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> UndrivenResult<T> {
        self.map_err(|e| UndrivenError::io(path, e))
    }
}
