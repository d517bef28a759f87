//! Elaborated design discovery and decoding.
//!
//! Front ends hand the analysis serialized designs (`*.json`, one design per
//! file). Directories are walked with subtree pruning; files are decoded on
//! the rayon pool and validated before anything indexes into them.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::design::Design;
use crate::error::{IoResultExt, UndrivenError, UndrivenResult};

/// Directories never searched for designs.
const EXCLUDED_DIRS: &[&str] = &["target", ".git", "node_modules"];

fn is_excluded_dir(entry: &walkdir::DirEntry, excludes: &HashSet<&str>) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| excludes.contains(name))
}

/// Collects design files under `root`, sorted by path.
///
/// A file path is returned as is, whatever its extension.
pub fn gather_design_files(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let excludes: HashSet<&str> = EXCLUDED_DIRS.iter().copied().collect();

    let mut files = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e, &excludes))
        .filter_map(|entry| match entry {
            Ok(e) => {
                let path = e.path();
                if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                    Some(Ok(path.to_path_buf()))
                } else {
                    None
                }
            }
            Err(e) => Some(Err(anyhow::Error::from(e))),
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Failed to gather design files from {}", root.display()))?;

    files.sort();
    Ok(files)
}

/// Reads, decodes and validates one design file.
pub fn load_design(path: &Path) -> UndrivenResult<Design> {
    let content = fs::read_to_string(path).with_path(path)?;
    parse_design(path, &content)
}

/// Decodes and validates design JSON; `path` only labels errors.
pub fn parse_design(path: &Path, content: &str) -> UndrivenResult<Design> {
    let design: Design =
        serde_json::from_str(content).map_err(|e| UndrivenError::design(path, e.to_string()))?;
    design.validate().map_err(|e| e.in_file(path))?;
    tracing::debug!(
        path = %path.display(),
        decls = design.decls.len(),
        scopes = design.scopes.len(),
        "loaded design"
    );
    Ok(design)
}

/// Loads every design in parallel. Results keep the order of `paths`.
pub fn load_designs(paths: &[PathBuf]) -> Vec<(PathBuf, UndrivenResult<Design>)> {
    paths
        .par_iter()
        .map(|p| (p.clone(), load_design(p)))
        .collect()
}

/// Gathers and loads every design under the given roots.
///
/// Stops at the first unreadable or malformed design.
pub fn load_all(roots: &[PathBuf]) -> Result<Vec<(PathBuf, Design)>> {
    let mut paths = Vec::new();
    for root in roots {
        paths.extend(gather_design_files(root)?);
    }
    tracing::info!(files = paths.len(), "design files found");

    load_designs(&paths)
        .into_iter()
        .map(|(path, result)| {
            let design =
                result.with_context(|| format!("Failed to load design {}", path.display()))?;
            Ok((path, design))
        })
        .collect()
}
