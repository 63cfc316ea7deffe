//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use pairdiff::core::config::{Config, Overrides, RunSettings};
use pairdiff::core::errors::PdError;
use pairdiff::dispatch::comparator::ProcessComparator;
use pairdiff::dispatch::dispatcher::{JobOutcome, JobStatus};
use pairdiff::pairing::pairer::{PairingEntry, Side};
use pairdiff::runner::{RunReport, Runner};
use pairdiff::scanner::walker::{DirectoryScanner, FileRecord};

/// pairdiff: compare identically named files across two directory trees.
#[derive(Debug, Parser)]
#[command(
    name = "pairdiff",
    author,
    version,
    about = "Pair same-named files across two trees and diff each pair",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override settings file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// List every scanned file on stderr.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Scan both trees, pair files by name and run the comparator on each pair.
    Run(RunArgs),
    /// Scan and pair only; list the pairs without comparing.
    Pairs(PairsArgs),
    /// List the files a single tree yields.
    Scan(ScanArgs),
    /// Inspect the settings file.
    Config(ConfigArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

/// Root selection shared by `run` and `pairs`.
#[derive(Debug, Clone, Args, Serialize, Default)]
struct SelectionArgs {
    /// Source tree (overrides `sourceDirectory`).
    #[arg(long, value_name = "DIR")]
    source: Option<PathBuf>,
    /// Target tree (overrides `targetDirectory`).
    #[arg(long, value_name = "DIR")]
    target: Option<PathBuf>,
    /// Keep metadata companion files instead of filtering them out.
    #[arg(long)]
    include_metadata: bool,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct RunArgs {
    #[command(flatten)]
    selection: SelectionArgs,
    /// Retention token passed to the comparator as `--expires`.
    #[arg(long, value_name = "TOKEN")]
    expires: Option<String>,
    /// Comparator program to invoke.
    #[arg(long, value_name = "PROGRAM")]
    comparator: Option<String>,
    /// Print the commands that would run without starting any process.
    #[arg(long)]
    dry_run: bool,
    /// Exit with status 4 when any comparison failed.
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct PairsArgs {
    #[command(flatten)]
    selection: SelectionArgs,
    /// Also list names found in only one tree.
    #[arg(long)]
    orphans: bool,
}

#[derive(Debug, Clone, Args, Serialize)]
struct ScanArgs {
    /// Directory to scan.
    path: PathBuf,
    /// Keep metadata companion files instead of filtering them out.
    #[arg(long)]
    include_metadata: bool,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand, Serialize)]
enum ConfigCommand {
    /// Print the settings file that would be read.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct VersionArgs {
    /// Include additional build metadata fields.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Operation partially succeeded.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<PdError> for CliError {
    fn from(err: PdError) -> Self {
        match err {
            PdError::InvalidConfig { .. }
            | PdError::MissingConfig { .. }
            | PdError::ConfigParse { .. }
            | PdError::MissingSetting { .. } => Self::User(err.to_string()),
            PdError::Serialization { .. } => Self::Internal(err.to_string()),
            PdError::DirectoryAccess { .. }
            | PdError::NotADirectory { .. }
            | PdError::Invocation { .. }
            | PdError::ComparatorExit { .. }
            | PdError::Io { .. } => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Run(args) => run_compare(cli, args),
        Command::Pairs(args) => run_pairs(cli, args),
        Command::Scan(args) => run_scan(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Version(args) => emit_version(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// run / pairs
// ---------------------------------------------------------------------------

fn load_settings(cli: &Cli, overrides: &Overrides) -> Result<RunSettings, CliError> {
    let config = Config::load(cli.config.as_deref())?.with_overrides(overrides)?;
    Ok(config.resolve()?)
}

fn selection_overrides(selection: &SelectionArgs) -> Overrides {
    Overrides {
        source: selection.source.clone(),
        target: selection.target.clone(),
        include_metadata: selection.include_metadata,
        ..Overrides::default()
    }
}

fn scan_logger(verbose: bool) -> impl Fn(Side, &FileRecord) {
    move |side, record| {
        if verbose {
            eprintln!("[PD-SCAN] {side}: {}", record.path.display());
        }
    }
}

fn run_compare(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let overrides = Overrides {
        expires: args.expires.clone(),
        comparator: args.comparator.clone(),
        ..selection_overrides(&args.selection)
    };
    let settings = load_settings(cli, &overrides)?;
    let comparator = ProcessComparator::new(settings.comparator.clone());

    if mode == OutputMode::Human && !cli.quiet {
        println!(
            "Comparing {} with {}",
            settings.source_root.display(),
            settings.target_root.display()
        );
    }

    let quiet = cli.quiet;
    let report = Runner::new(&settings)
        .with_scan_observer(scan_logger(cli.verbose))
        .run(&comparator, args.dry_run, |outcome| {
            if mode == OutputMode::Human {
                print_outcome(outcome, quiet);
            }
        })?;

    match mode {
        OutputMode::Human => {
            if !cli.quiet {
                print_tally(&report, args.dry_run);
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "run",
                "dry_run": args.dry_run,
                "report": serde_json::to_value(&report)?,
            });
            write_json_line(&payload)?;
        }
    }

    let failed = report.dispatch.failed();
    if failed == 0 {
        if report.pairing.married == 0 && !cli.quiet {
            eprintln!("[PD-WARN] no file name appears in both trees; nothing was compared");
        }
        return Ok(());
    }

    let message = format!(
        "{failed} of {} comparisons failed",
        report.dispatch.attempted()
    );
    if args.strict {
        return Err(CliError::Partial(message));
    }
    if !cli.quiet {
        eprintln!("[PD-WARN] {message}");
    }
    Ok(())
}

fn print_outcome(outcome: &JobOutcome, quiet: bool) {
    match &outcome.status {
        JobStatus::Succeeded if !quiet => {
            println!("  {}  {}  {}", "Success".green().bold(), outcome.name, outcome.output);
        }
        JobStatus::Succeeded => {}
        JobStatus::Planned { command } => {
            if !quiet {
                println!("  {}  {}  {}", "Planned".cyan(), outcome.name, command.join(" "));
            }
        }
        JobStatus::Failed { message, .. } => {
            println!("  {}  {}  {message}", "Failure".red().bold(), outcome.name);
            for line in outcome.output.lines() {
                println!("      {}", line.dimmed());
            }
        }
    }
}

fn print_tally(report: &RunReport, dry_run: bool) {
    let dispatch = &report.dispatch;
    if dry_run {
        println!(
            "{} planned, {} skipped ({} source files, {} target files)",
            dispatch.planned(),
            dispatch.skipped,
            report.source_files,
            report.target_files
        );
        return;
    }
    let failed = if dispatch.failed() > 0 {
        format!("{} failed", dispatch.failed()).red().to_string()
    } else {
        "0 failed".to_string()
    };
    println!(
        "Compared {}: {} succeeded, {failed}, {} skipped ({} ms)",
        dispatch.attempted(),
        dispatch.succeeded(),
        dispatch.skipped,
        report.duration_ms
    );
}

fn run_pairs(cli: &Cli, args: &PairsArgs) -> Result<(), CliError> {
    let settings = load_settings(cli, &selection_overrides(&args.selection))?;
    let paired = Runner::new(&settings)
        .with_scan_observer(scan_logger(cli.verbose))
        .pair()?;
    let summary = paired.pairs.summary();

    let listed: Vec<(&str, &PairingEntry)> = if args.orphans {
        paired.pairs.iter().collect()
    } else {
        paired.pairs.married().collect()
    };

    match output_mode(cli) {
        OutputMode::Human => {
            for (name, entry) in &listed {
                match entry.orphan_side() {
                    Some(side) => println!("{name} {}", format!("({side} only)").yellow()),
                    None => println!("{}", name.bold()),
                }
                for path in entry.paths() {
                    println!("    {}", path.display());
                }
            }
            if !cli.quiet {
                println!(
                    "{} names: {} paired, {} source only, {} target only",
                    summary.names, summary.married, summary.source_only, summary.target_only
                );
            }
        }
        OutputMode::Json => {
            let mut entries = Map::new();
            for (name, entry) in listed {
                entries.insert(name.to_string(), serde_json::to_value(entry)?);
            }
            let payload = json!({
                "command": "pairs",
                "source_root": settings.source_root.to_string_lossy(),
                "target_root": settings.target_root.to_string_lossy(),
                "source_files": paired.source_files,
                "target_files": paired.target_files,
                "summary": serde_json::to_value(&summary)?,
                "entries": Value::Object(entries),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let mut options = config.scan_options();
    if args.include_metadata {
        options.exclude_metadata = false;
    }

    let records = DirectoryScanner::new(options).scan(&args.path)?;

    match output_mode(cli) {
        OutputMode::Human => {
            for record in &records {
                println!("{}", record.path.display());
            }
            if cli.verbose {
                eprintln!("[PD-SCAN] {} files under {}", records.len(), args.path.display());
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "scan",
                "root": args.path.to_string_lossy(),
                "count": records.len(),
                "files": serde_json::to_value(&records)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli
                .config
                .clone()
                .or_else(|| Config::locate(None, Path::new(".")));
            let exists = path.as_deref().is_some_and(Path::exists);

            match output_mode(cli) {
                OutputMode::Human => match &path {
                    Some(path) => {
                        println!("{}", path.display());
                        if !exists {
                            println!("  (file does not exist)");
                        }
                    }
                    None => println!("(no settings file found; defaults will be used)"),
                },
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.as_ref().map(|p| p.to_string_lossy()),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    if let Some(file) = &config.source_file {
                        println!("# loaded from {}", file.display());
                    }
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "source_file": config.source_file.as_ref().map(|p| p.to_string_lossy()),
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => {
            let checked = Config::load(cli.config.as_deref())
                .and_then(|config| config.resolve().map(|settings| (config, settings)));
            match checked {
                Ok((config, settings)) => {
                    match output_mode(cli) {
                        OutputMode::Human => {
                            println!("Configuration is valid.");
                            if let Some(file) = &config.source_file {
                                println!("  File: {}", file.display());
                            }
                            println!("  Source: {}", settings.source_root.display());
                            println!("  Target: {}", settings.target_root.display());
                            println!("  Comparator: {}", settings.comparator.program);
                        }
                        OutputMode::Json => {
                            let payload = json!({
                                "command": "config validate",
                                "valid": true,
                                "path": config.source_file.as_ref().map(|p| p.to_string_lossy()),
                                "source": settings.source_root.to_string_lossy(),
                                "target": settings.target_root.to_string_lossy(),
                            });
                            write_json_line(&payload)?;
                        }
                    }
                    Ok(())
                }
                Err(e) => {
                    if output_mode(cli) == OutputMode::Json {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error_code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                    Err(CliError::User(format!("configuration is invalid: {e}")))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// version / output helpers
// ---------------------------------------------------------------------------

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");
    let git_sha = option_env!("GIT_SHA").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("pairdiff {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
                println!("git_sha: {git_sha}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "pairdiff",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                    "git_sha": git_sha,
                }
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("PAIRDIFF_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        Some("auto") | None => fallback,
        Some(_) => fallback,
    }
}
