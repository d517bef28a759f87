//! undriven CLI - usage and definite-assignment diagnostics for elaborated HDL designs.
//!
//! Features:
//! - Directory scanning for serialized designs (`*.json`)
//! - Parallel design loading and optional parallel traversal
//! - undriven.toml configuration with command-line overrides
//! - Plain text or JSON reports
//! - Graphviz DOT export of the instantiation hierarchy

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use undriven_core::{
    build_hierarchy, gather_design_files, init_structured_logging, load_config, load_config_file,
    load_designs, print_plain, reachable_definitions, render_plain, report_json, to_dot, Analysis,
    AnalysisResult, Design, UndrivenConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Unused and undriven declaration diagnostics for HDL designs")]
pub struct Cli {
    /// Design files or directories to analyze
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// Output results in JSON format
    #[arg(long)]
    json: bool,

    /// Treat designs as script fragments (no top-level port rules)
    #[arg(long)]
    script_mode: bool,

    /// Suppress every usage diagnostic
    #[arg(long)]
    suppress_unused: bool,

    /// Regular expressions over declaration names to ignore
    #[arg(long, num_args = 1..)]
    ignore: Vec<String>,

    /// Traverse independent root scopes in parallel
    #[arg(long)]
    parallel: bool,

    /// Report at most this many diagnostics per design
    #[arg(long, value_name = "N")]
    max: Option<usize>,

    /// Generate Graphviz DOT output for the instantiation hierarchy
    #[arg(long)]
    dot: bool,

    /// Write DOT output to a specified file instead of stdout
    #[arg(long)]
    dot_file: Option<String>,

    /// Configuration file (default: undriven.toml next to the first path)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Exit status when some design could not be analyzed or the process panicked.
const EXIT_FAILURE: i32 = 2;
/// Exit status when every design was analyzed and some produced diagnostics.
const EXIT_DIAGNOSTICS: i32 = 1;

/// Security: Validates output file paths to prevent path traversal.
///
/// Rejects absolute paths, `..` components and null bytes.
fn validate_output_path(path: &str) -> Result<PathBuf> {
    if path.contains('\0') {
        return Err(anyhow!("Output path contains null bytes"));
    }

    let p = PathBuf::from(path);
    if p.is_absolute() {
        return Err(anyhow!("Output path must be relative, not absolute: {}", path));
    }
    if p
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(anyhow!("Path traversal (..) not allowed in output paths: {}", path));
    }
    Ok(p)
}

/// Directory searched for undriven.toml when `--config` is absent.
fn config_dir(paths: &[PathBuf]) -> PathBuf {
    match paths.first() {
        Some(p) if p.is_dir() => p.clone(),
        Some(p) => p
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        None => PathBuf::from("."),
    }
}

fn resolve_config(cli: &Cli) -> Result<Option<UndrivenConfig>> {
    if let Some(file) = &cli.config {
        let cfg = load_config_file(file)
            .with_context(|| format!("Failed to load config from: {}", file.display()))?;
        return Ok(Some(cfg));
    }
    // an unreadable default config only warns
    match load_config(&config_dir(&cli.paths)) {
        Ok(cfg) => Ok(cfg),
        Err(e) => {
            eprintln!("[WARN] config load failed: {}", e);
            Ok(None)
        }
    }
}

fn wants_json(cli: &Cli, cfg: Option<&UndrivenConfig>) -> bool {
    cli.json
        || cfg
            .and_then(|c| c.output.as_ref())
            .and_then(|o| o.format.as_deref())
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
}

/// Runs one design with config settings first and flags layered on top.
fn analyze(design: &Design, cli: &Cli, cfg: Option<&UndrivenConfig>) -> Result<AnalysisResult> {
    let mut analysis = Analysis::new(design);
    if let Some(cfg) = cfg {
        analysis = analysis.with_config(cfg);
    }
    if cli.script_mode {
        analysis = analysis.script_mode(true);
    }
    if cli.suppress_unused {
        analysis = analysis.suppress_unused(true);
    }
    if cli.parallel {
        analysis = analysis.parallel(true);
    }
    if let Some(max) = cli.max {
        analysis = analysis.max_diagnostics(max);
    }
    analysis = analysis.ignore_patterns(cli.ignore.iter().cloned());
    Ok(analysis.run()?)
}

fn exit_code(failed: bool, any_diagnostics: bool) -> i32 {
    if failed {
        EXIT_FAILURE
    } else if any_diagnostics {
        EXIT_DIAGNOSTICS
    } else {
        0
    }
}

fn panic_notice(info: &dyn std::fmt::Display) -> String {
    format!(
        "[PANIC] undriven internal error: {}\n[PANIC] The process will exit with code {}.",
        info, EXIT_FAILURE
    )
}

fn hierarchy_dot(design: &Design) -> String {
    let g = build_hierarchy(design);
    let reachable = reachable_definitions(&g, design.tops.iter().copied());
    to_dot(design, &g, &reachable)
}

fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("{}", panic_notice(info));
        std::process::exit(EXIT_FAILURE);
    }));

    // JSON logs to stderr, respects RUST_LOG
    init_structured_logging();

    let cli = Cli::parse();

    // 1. Configuration
    let cfg = resolve_config(&cli)?;
    let json = wants_json(&cli, cfg.as_ref());

    // 2. Discover design files
    let mut files = Vec::new();
    for path in &cli.paths {
        files.extend(
            gather_design_files(path)
                .with_context(|| format!("Failed to gather designs from: {}", path.display()))?,
        );
    }
    if files.is_empty() {
        eprintln!("[WARN] no design files found");
    }

    // 3. Load and analyze; a broken design is reported and skipped
    let mut failed = false;
    let mut any_diagnostics = false;
    let mut reports = Vec::new();
    let mut dots = Vec::new();
    let multiple = files.len() > 1;

    for (path, loaded) in load_designs(&files) {
        let design = match loaded {
            Ok(d) => d,
            Err(e) if e.is_recoverable() => {
                eprintln!("[ERROR] {}", e);
                failed = true;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let result = analyze(&design, &cli, cfg.as_ref())
            .with_context(|| format!("Analysis failed for: {}", path.display()))?;
        any_diagnostics |= result.has_diagnostics();

        if json {
            reports.push(serde_json::json!({
                "path": path.display().to_string(),
                "report": report_json(&result),
            }));
        } else if multiple {
            println!("== {} ==", path.display());
            print!("{}", render_plain(&result));
            println!();
        } else {
            print_plain(&result);
        }

        if cli.dot || cli.dot_file.is_some() {
            dots.push(hierarchy_dot(&design));
        }
    }

    // 4. Report
    if json {
        match serde_json::to_string_pretty(&reports) {
            Ok(out) => println!("{}", out),
            Err(e) => eprintln!("[WARN] JSON serialization failed: {}", e),
        }
    }

    // 5. DOT/Graphviz output (write errors only warn)
    if !dots.is_empty() {
        let dot = dots.join("\n");
        if let Some(ref file) = cli.dot_file {
            match validate_output_path(file) {
                Ok(safe_path) => {
                    if let Err(e) = fs::write(&safe_path, &dot) {
                        eprintln!("[WARN] DOT write failed to {}: {}", safe_path.display(), e);
                    }
                }
                Err(e) => {
                    eprintln!("[ERROR] Invalid output path: {}", e);
                    std::process::exit(EXIT_FAILURE);
                }
            }
        } else {
            println!("{}", dot);
        }
    }

    // 6. Exit code (CI-friendly)
    std::process::exit(exit_code(failed, any_diagnostics));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_temp_dir(name: &str) -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let temp_dir = std::env::temp_dir()
            .join("undriven_cli_test")
            .join(format!("{}_{}", name, id));
        if temp_dir.exists() {
            fs::remove_dir_all(&temp_dir).ok();
        }
        fs::create_dir_all(&temp_dir).unwrap();
        temp_dir
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("undriven").chain(args.iter().copied()))
    }

    // --- validate_output_path TESTS ---

    #[test]
    fn test_validate_relative_path() {
        assert_eq!(validate_output_path("out/h.dot").unwrap(), PathBuf::from("out/h.dot"));
    }

    #[test]
    fn test_validate_rejects_traversal() {
        assert!(validate_output_path("../h.dot").is_err());
        assert!(validate_output_path("a/../../h.dot").is_err());
    }

    #[test]
    fn test_validate_rejects_absolute_and_nul() {
        assert!(validate_output_path("/tmp/h.dot").is_err());
        assert!(validate_output_path("h\0.dot").is_err());
    }

    // --- argument and config TESTS ---

    #[test]
    fn test_cli_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.paths, vec![PathBuf::from(".")]);
        assert!(!cli.json);
        assert!(cli.max.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cli = parse(&["a.json", "--script-mode", "--max", "4", "--ignore", "^dbg_", "^tmp_"]);
        assert_eq!(cli.paths, vec![PathBuf::from("a.json")]);
        assert!(cli.script_mode);
        assert_eq!(cli.max, Some(4));
        assert_eq!(cli.ignore, vec!["^dbg_".to_string(), "^tmp_".to_string()]);
    }

    #[test]
    fn test_config_dir_for_file_and_dir() {
        let dir = create_temp_dir("config_dir");
        assert_eq!(config_dir(&[dir.clone()]), dir);
        assert_eq!(config_dir(&[dir.join("top.json")]), dir);
        assert_eq!(config_dir(&[PathBuf::from("top.json")]), PathBuf::from("."));
    }

    #[test]
    fn test_json_from_config_format() {
        let dir = create_temp_dir("format");
        fs::write(dir.join("undriven.toml"), "[output]\nformat = \"JSON\"\n").unwrap();
        let cli = parse(&[dir.to_str().unwrap()]);
        let cfg = resolve_config(&cli).unwrap();
        assert!(wants_json(&cli, cfg.as_ref()));
        assert!(!wants_json(&parse(&[]), None));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = create_temp_dir("missing_config");
        let missing = dir.join("nope.toml");
        let cli = parse(&["--config", missing.to_str().unwrap()]);
        assert!(resolve_config(&cli).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let design = Design::default();
        let cfg = UndrivenConfig {
            suppress_unused: Some(false),
            ..Default::default()
        };
        let cli = parse(&["--suppress-unused"]);
        let result = analyze(&design, &cli, Some(&cfg)).unwrap();
        assert!(!result.has_diagnostics());
        assert_eq!(result.stats.scopes, 0);
    }

    // --- exit status TESTS ---

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(false, false), 0);
        assert_eq!(exit_code(false, true), EXIT_DIAGNOSTICS);
        assert_eq!(exit_code(true, true), EXIT_FAILURE);
    }

    #[test]
    fn test_panic_hook_exits_with_failure_code() {
        let captured = std::sync::Arc::new(std::sync::Mutex::new(String::new()));
        let sink = std::sync::Arc::clone(&captured);
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            *sink.lock().unwrap() = panic_notice(info);
        }));
        let outcome = std::panic::catch_unwind(|| panic!("broken design graph"));
        std::panic::set_hook(previous);

        assert!(outcome.is_err());
        let notice = captured.lock().unwrap().clone();
        assert!(notice.contains("broken design graph"));
        assert!(notice.ends_with(&format!("exit with code {}.", EXIT_FAILURE)));
    }
}
