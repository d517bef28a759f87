//! Configuration loading from undriven.toml.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

pub const CONFIG_FILE: &str = "undriven.toml";

/// Main configuration structure for undriven.toml.
#[derive(Debug, Deserialize, Default)]
pub struct UndrivenConfig {
    /// Suppress the whole usage diagnostic category.
    pub suppress_unused: Option<bool>,
    /// Treat designs as script fragments (no top-level port rules).
    pub script_mode: Option<bool>,
    /// Traverse root scopes on the rayon pool.
    pub parallel: Option<bool>,
    /// Stop after this many diagnostics.
    pub max_diagnostics: Option<usize>,
    /// Regular expressions over declaration names to exempt.
    pub ignore: Option<Vec<String>>,
    /// Output configuration.
    pub output: Option<OutputConfig>,
}

/// Output format configuration.
#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    /// Output format: "plain" or "json".
    pub format: Option<String>,
}

/// Loads configuration from undriven.toml in `root` if it exists.
pub fn load_config(root: &Path) -> Result<Option<UndrivenConfig>> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(&path).map(Some)
}

/// Loads an explicitly named configuration file.
pub fn load_config_file(path: &Path) -> Result<UndrivenConfig> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let cfg = toml::from_str(&content).with_context(|| format!("Invalid {}", path.display()))?;
    Ok(cfg)
}
