// crates/ccguard-cli/src/main.rs
// ============================================================================
// Module: ccguard CLI Entry Point
// Description: Command dispatcher for coverage regression checks and upkeep.
// Purpose: Guard merges against coverage regressions from CI or a shell.
// Dependencies: clap, ccguard-core, ccguard-config, ccguard-git, tracing.
// ============================================================================

//! ## Overview
//! `ccguard check` compares a fresh Cobertura report against the nearest
//! recorded ancestor and exits with 255 on regression. `sync`, `log`,
//! `diff`, and `offload` maintain and inspect the reference stores.
//! Diagnostics go to stderr through `tracing`; verdicts go to stdout.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub(crate) mod backend;
#[cfg(test)]
mod main_tests;
pub(crate) mod render;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use ccguard_cobertura::CoberturaDiff;
use ccguard_cobertura::CoberturaReport;
use ccguard_core::ANCESTOR_PAGE_SIZE;
use ccguard_core::BranchName;
use ccguard_core::CommitId;
use ccguard_core::NewReference;
use ccguard_core::PersistOutcome;
use ccguard_core::ReferenceStore;
use ccguard_core::RegressionThresholds;
use ccguard_core::Subtype;
use ccguard_core::VersionControl;
use ccguard_core::evaluate_regression;
use ccguard_core::transfer;
use ccguard_core::try_determine_parent_commit;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::backend::Workspace;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum coverage report size accepted from disk.
const MAX_REPORT_BYTES: usize = 256 * 1024 * 1024;
/// Exit code signalling a coverage regression.
const REGRESSION_EXIT_CODE: u8 = 255;
/// Default number of commits shown by `log`.
const DEFAULT_LOG_LIMIT: usize = 30;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "ccguard", version, disable_help_subcommand = true)]
struct Cli {
    /// Print debug diagnostics to stderr (overrides `RUST_LOG`).
    #[arg(long, global = true)]
    debug: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a coverage report against the nearest recorded ancestor.
    Check(CheckCommand),
    /// Copy references from one backend to another.
    Sync(SyncCommand),
    /// Show recent commits and whether each has a reference.
    Log(LogCommand),
    /// Compare the references of two recorded commits.
    Diff(DiffCommand),
    /// Move rarely used payloads of the sqlite backend to long-term storage.
    Offload(OffloadCommand),
}

/// Repository and configuration location shared by every command.
#[derive(Args, Debug, Clone)]
struct RepositoryArgs {
    /// Repository to analyze.
    #[arg(long, value_name = "PATH", default_value = ".")]
    repository: PathBuf,
    /// Configuration file replacing `~/.ccguard.toml` and the repository file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl RepositoryArgs {
    /// Opens the workspace these arguments point at.
    fn open(&self) -> CliResult<Workspace> {
        Workspace::open(&self.repository, self.config.as_deref())
    }
}

/// Policy threshold overrides.
#[derive(Args, Debug, Clone, Default)]
struct ThresholdArgs {
    /// Allowed per-file drop below the reference rate.
    #[arg(long, value_name = "RATE")]
    tolerance: Option<f64>,
    /// Absolute per-file floor; negative disables it.
    #[arg(long, value_name = "RATE", allow_hyphen_values = true)]
    hard_minimum: Option<f64>,
}

/// Arguments for `check`.
#[derive(Args, Debug)]
struct CheckCommand {
    /// Cobertura report for the current commit.
    report: PathBuf,
    /// Repository and configuration location.
    #[command(flatten)]
    location: RepositoryArgs,
    /// Branch this change will be merged into.
    #[arg(long, value_name = "BRANCH")]
    target_branch: Option<String>,
    /// Backend to use (sqlite, redis, or web).
    #[arg(long, value_name = "NAME")]
    adapter: Option<String>,
    /// Measurement subtype (for example unit or integration).
    #[arg(long, value_name = "NAME")]
    subtype: Option<String>,
    /// Policy threshold overrides.
    #[command(flatten)]
    thresholds: ThresholdArgs,
    /// Compare uncommitted changes; the report is not persisted.
    #[arg(long)]
    consider_uncommitted_changes: bool,
}

/// Arguments for `sync`.
#[derive(Args, Debug)]
struct SyncCommand {
    /// Backend to read from.
    source: String,
    /// Backend to write to.
    dest: String,
    /// Repository and configuration location.
    #[command(flatten)]
    location: RepositoryArgs,
    /// Limit the transfer to this commit.
    #[arg(long, value_name = "COMMIT")]
    commit_id: Option<String>,
    /// Measurement subtype for a single-commit transfer.
    #[arg(long, value_name = "NAME")]
    subtype: Option<String>,
}

/// Arguments for `log`.
#[derive(Args, Debug)]
struct LogCommand {
    /// Repository and configuration location.
    #[command(flatten)]
    location: RepositoryArgs,
    /// Number of commits to show.
    #[arg(short = 'n', value_name = "COUNT", default_value_t = DEFAULT_LOG_LIMIT)]
    limit: usize,
    /// Backend to use (sqlite, redis, or web).
    #[arg(long, value_name = "NAME")]
    adapter: Option<String>,
    /// Measurement subtype.
    #[arg(long, value_name = "NAME")]
    subtype: Option<String>,
}

/// Arguments for `diff`.
#[derive(Args, Debug)]
struct DiffCommand {
    /// Reference commit (a unique prefix is enough).
    first: String,
    /// Challenger commit (a unique prefix is enough).
    second: String,
    /// Repository and configuration location.
    #[command(flatten)]
    location: RepositoryArgs,
    /// Backend to use (sqlite, redis, or web).
    #[arg(long, value_name = "NAME")]
    adapter: Option<String>,
    /// Measurement subtype.
    #[arg(long, value_name = "NAME")]
    subtype: Option<String>,
    /// Policy threshold overrides.
    #[command(flatten)]
    thresholds: ThresholdArgs,
}

/// Arguments for `offload`.
#[derive(Args, Debug)]
struct OffloadCommand {
    /// Repository and configuration location.
    #[command(flatten)]
    location: RepositoryArgs,
    /// List candidates without moving them.
    #[arg(long)]
    dry_run: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing error messages.
#[derive(Debug, Error)]
#[error("{message}")]
pub(crate) struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    pub(crate) const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
pub(crate) type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;
    match cli.command {
        Commands::Check(command) => command_check(&command),
        Commands::Sync(command) => command_sync(&command),
        Commands::Log(command) => command_log(&command),
        Commands::Diff(command) => command_diff(&command),
        Commands::Offload(command) => command_offload(&command),
    }
}

/// Installs the stderr subscriber; `--debug` wins over `RUST_LOG`.
fn init_tracing(debug: bool) -> CliResult<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| CliError::new(format!("cannot initialize logging: {err}")))
}

// ============================================================================
// SECTION: Check Command
// ============================================================================

/// Executes `check`.
fn command_check(command: &CheckCommand) -> CliResult<ExitCode> {
    let workspace = command.location.open()?;
    let policy = &workspace.config.policy;
    let thresholds =
        resolve_thresholds(&command.thresholds, policy.tolerance, policy.hard_minimum)?;
    let target_branch = command.target_branch.as_deref().unwrap_or(&policy.target_branch);
    let subtype = Subtype::or_default(command.subtype.as_deref());
    let root = vcs(workspace.git.root_path())?;

    let payload = read_report(&command.report)?;
    let challenger = parse_report(&payload, &root, &command.report.display().to_string())?;
    write_lines(&render::coverage_table(&challenger))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;

    let store = workspace.open_store(command.adapter.as_deref())?;
    let known = store_call(store.known_commits(&subtype))?;
    debug!(count = known.len(), subtype = %subtype, "reference commits loaded");

    let Some(common_ancestor) = vcs(workspace.git.merge_base(target_branch, "HEAD"))? else {
        return Err(CliError::new(format!("no common ancestor with {target_branch}")));
    };
    let start = if command.consider_uncommitted_changes {
        Some(common_ancestor)
    } else {
        vcs(workspace.git.first_parent(&common_ancestor))?
    };
    let reference_commit = match start {
        Some(start) => {
            let refs = [start.as_str().to_string()];
            let batches = vcs(workspace.git.ancestor_batches(&refs, ANCESTOR_PAGE_SIZE))?;
            vcs(try_determine_parent_commit(&known, batches))?
        }
        None => None,
    };

    let diff = match reference_commit {
        Some(commit) => {
            info!(commit = %commit, "retrieving reference coverage");
            match store_call(store.retrieve(&commit, &subtype))? {
                Some(bytes) => {
                    let reference = parse_report(&bytes, &root, commit.as_str())?;
                    Some(CoberturaDiff::new(reference, challenger))
                }
                None => {
                    warn!(commit = %commit, "reference vanished before retrieval");
                    None
                }
            }
        }
        None => {
            warn!("no reference code coverage data found");
            None
        }
    };

    if !command.consider_uncommitted_changes {
        let current = vcs(workspace.git.current_commit())?;
        let branch = vcs(workspace.git.current_branch())?.map(BranchName::new);
        persist_challenger(store.as_ref(), current, payload, subtype, branch)?;
    }

    let Some(diff) = diff else {
        return Ok(ExitCode::SUCCESS);
    };
    let outcome = evaluate_regression(&diff, &thresholds);
    write_lines(&render::verdict_lines(&diff, &outcome))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_lines(&render::delta_table(&diff))?;
    Ok(if outcome.improved { ExitCode::SUCCESS } else { ExitCode::from(REGRESSION_EXIT_CODE) })
}

/// Persists the challenger report; an existing record is left as is.
fn persist_challenger(
    store: &dyn ReferenceStore,
    commit: CommitId,
    payload: Vec<u8>,
    subtype: Subtype,
    branch: Option<BranchName>,
) -> CliResult<()> {
    let reference = NewReference::new(commit, payload).with_subtype(subtype).with_branch(branch);
    match store_call(store.persist(&reference))? {
        PersistOutcome::Stored => {
            info!(commit = %reference.commit_id, "coverage reference persisted");
        }
        PersistOutcome::AlreadyExists => {
            debug!(commit = %reference.commit_id, "coverage reference already recorded");
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Sync Command
// ============================================================================

/// Executes `sync`.
fn command_sync(command: &SyncCommand) -> CliResult<ExitCode> {
    let workspace = command.location.open()?;
    let source = workspace.open_store(Some(&command.source))?;
    let dest = workspace.open_store(Some(&command.dest))?;
    let commit = command.commit_id.as_deref().map(CommitId::new);
    let subtype = Subtype::or_default(command.subtype.as_deref());
    let report = store_call(transfer(commit.as_ref(), &subtype, source.as_ref(), dest.as_ref()))?;
    write_stdout_line(&format!(
        "transferred {} reference(s) from {} to {}: {} already present, {} skipped",
        report.stored, command.source, command.dest, report.already_present, report.skipped
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Log Command
// ============================================================================

/// Executes `log`.
fn command_log(command: &LogCommand) -> CliResult<ExitCode> {
    let workspace = command.location.open()?;
    let store = workspace.open_store(command.adapter.as_deref())?;
    let subtype = Subtype::or_default(command.subtype.as_deref());
    let known = store_call(store.known_commits(&subtype))?;
    if command.limit == 0 {
        return Ok(ExitCode::SUCCESS);
    }
    let mut batches = vcs(workspace.git.ancestor_batches(&[], command.limit))?;
    let commits = vcs(batches.next().transpose())?;
    for commit in commits.unwrap_or_default() {
        let subject = vcs(workspace.git.commit_subject(&commit))?;
        let recorded = known.contains(&commit);
        let summary =
            if recorded { store_call(store.summary(&commit, &subtype))? } else { None };
        write_stdout_line(&render::log_line(&commit, &subject, recorded, summary.as_ref()))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Diff Command
// ============================================================================

/// Executes `diff`.
fn command_diff(command: &DiffCommand) -> CliResult<ExitCode> {
    let workspace = command.location.open()?;
    let policy = &workspace.config.policy;
    let thresholds =
        resolve_thresholds(&command.thresholds, policy.tolerance, policy.hard_minimum)?;
    let store = workspace.open_store(command.adapter.as_deref())?;
    let subtype = Subtype::or_default(command.subtype.as_deref());
    let known = store_call(store.known_commits(&subtype))?;
    let (Some(first), Some(second)) =
        (resolve_prefix(&known, &command.first)?, resolve_prefix(&known, &command.second)?)
    else {
        return Err(CliError::new("can't find matching references".to_string()));
    };
    let root = vcs(workspace.git.root_path())?;
    let reports = [&first, &second].map(|commit| -> CliResult<CoberturaReport> {
        let bytes = store_call(store.retrieve(commit, &subtype))?.ok_or_else(|| {
            CliError::new(format!("reference for {commit} disappeared during diff"))
        })?;
        parse_report(&bytes, &root, commit.as_str())
    });
    let [reference, challenger] = reports;
    let diff = CoberturaDiff::new(reference?, challenger?);
    write_stdout_line(&format!("Comparing {} with {}", first.short(), second.short()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    let outcome = evaluate_regression(&diff, &thresholds);
    write_lines(&render::verdict_lines(&diff, &outcome))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_lines(&render::delta_table(&diff))?;
    Ok(if outcome.improved { ExitCode::SUCCESS } else { ExitCode::from(REGRESSION_EXIT_CODE) })
}

/// Resolves a commit prefix against recorded commits.
///
/// Returns `None` when nothing matches and an error when several commits do.
fn resolve_prefix(known: &BTreeSet<CommitId>, prefix: &str) -> CliResult<Option<CommitId>> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Err(CliError::new("commit prefix must not be empty".to_string()));
    }
    let mut matches = known.iter().filter(|commit| commit.as_str().starts_with(prefix));
    let first = matches.next().cloned();
    if matches.next().is_some() {
        return Err(CliError::new(format!("commit prefix {prefix} is ambiguous")));
    }
    Ok(first)
}

// ============================================================================
// SECTION: Offload Command
// ============================================================================

/// Executes `offload`.
fn command_offload(command: &OffloadCommand) -> CliResult<ExitCode> {
    let workspace = command.location.open()?;
    let store = workspace.open_sqlite()?;
    let candidates = store
        .offload_candidates()
        .map_err(|err| CliError::new(format!("cannot list offload candidates: {err}")))?;
    if candidates.is_empty() {
        write_stdout_line("nothing to offload")
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }
    for candidate in candidates {
        let line = if command.dry_run {
            format!(
                "would offload {} ({}, used {} time(s))",
                candidate.commit_id.short(),
                candidate.subtype,
                candidate.use_count
            )
        } else {
            let path = store
                .offload(&candidate.commit_id, &candidate.subtype)
                .map_err(|err| CliError::new(format!("offload failed: {err}")))?;
            format!(
                "offloaded {} ({}) to {}",
                candidate.commit_id.short(),
                candidate.subtype,
                path.display()
            )
        };
        write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Merges flag overrides with configured thresholds.
fn resolve_thresholds(
    overrides: &ThresholdArgs,
    tolerance: f64,
    hard_minimum: f64,
) -> CliResult<RegressionThresholds> {
    RegressionThresholds::new(
        overrides.tolerance.unwrap_or(tolerance),
        overrides.hard_minimum.unwrap_or(hard_minimum),
    )
    .map_err(|err| CliError::new(err.to_string()))
}

/// Parses a Cobertura payload, naming its origin on failure.
fn parse_report(payload: &[u8], root: &Path, origin: &str) -> CliResult<CoberturaReport> {
    CoberturaReport::parse(payload, Some(root))
        .map_err(|err| CliError::new(format!("cannot parse coverage report {origin}: {err}")))
}

/// Reads the challenger report with a hard size limit.
fn read_report(path: &Path) -> CliResult<Vec<u8>> {
    read_bytes_with_limit(path, MAX_REPORT_BYTES).map_err(|err| match err {
        ReadLimitError::Io(err) => {
            CliError::new(format!("cannot read coverage report {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "coverage report {} is too large ({size} bytes, limit {limit})",
            path.display()
        )),
    })
}

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Maps a version-control failure into a CLI error.
fn vcs<T, E: std::fmt::Display>(result: Result<T, E>) -> CliResult<T> {
    result.map_err(|err| CliError::new(format!("git: {err}")))
}

/// Maps a reference-store failure into a CLI error.
fn store_call<T>(result: Result<T, ccguard_core::StoreError>) -> CliResult<T> {
    result.map_err(|err| CliError::new(format!("reference store: {err}")))
}

/// Writes every line to stdout.
fn write_lines(lines: &[String]) -> CliResult<()> {
    for line in lines {
        write_stdout_line(line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(())
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(&format!("ccguard: {message}"));
    ExitCode::FAILURE
}
