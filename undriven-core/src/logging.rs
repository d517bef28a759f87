//! Structured logging using **tracing**.
//!
//! The engine emits spans and events through the `tracing` macros; nothing is
//! printed unless a subscriber is installed. The CLI installs the JSON
//! subscriber below so that stdout stays reserved for the report.

use tracing::{error, info, warn};

/// Initializes the global tracing subscriber.
///
/// Call once at program start. Output is JSON on stderr.
///
/// # Environment Variables
/// - `RUST_LOG`: Controls log filtering (e.g., `RUST_LOG=undriven_core=debug`)
pub fn init_structured_logging() {
    // A second call (tests, embedding hosts) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_level(true)
        .with_target(true)
        .with_current_span(true)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Logs a warning event.
pub fn log_warn(message: &str) {
    warn!(detail = %message);
}

/// Logs an info event.
pub fn log_info(message: &str) {
    info!(detail = %message);
}

/// Logs an error event.
pub fn log_error(message: &str) {
    error!(detail = %message);
}
