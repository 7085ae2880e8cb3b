// crates/ccguard-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for bounded reads, argument parsing, and rendering.
// Purpose: Ensure CLI inputs fail closed and output stays stable.
// Dependencies: ccguard-cli main helpers, ccguard-cobertura
// ============================================================================

//! ## Overview
//! Validates `read_bytes_with_limit`, commit prefix resolution, flag
//! parsing, and the text renderers used by `check`, `diff`, and `log`.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::io::Write;

use ccguard_cobertura::CoberturaDiff;
use ccguard_cobertura::CoberturaReport;
use ccguard_core::CommitId;
use ccguard_core::CoverageSummary;
use ccguard_core::RegressionThresholds;
use ccguard_core::evaluate_regression;
use clap::Parser;
use tempfile::NamedTempFile;

use super::Cli;
use super::Commands;
use super::ReadLimitError;
use super::ThresholdArgs;
use super::read_bytes_with_limit;
use super::render;
use super::resolve_prefix;
use super::resolve_thresholds;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn report(classes: &[(&str, &[(u64, u64)])]) -> CoberturaReport {
    let mut xml = String::from("<?xml version=\"1.0\" ?><coverage version=\"7.4\"><packages>");
    xml.push_str("<package name=\"pkg\"><classes>");
    for (filename, lines) in classes {
        xml.push_str(&format!("<class name=\"c\" filename=\"{filename}\"><lines>"));
        for (number, hits) in *lines {
            xml.push_str(&format!("<line number=\"{number}\" hits=\"{hits}\"/>"));
        }
        xml.push_str("</lines></class>");
    }
    xml.push_str("</classes></package></packages></coverage>");
    CoberturaReport::parse(xml.as_bytes(), None).expect("parse report")
}

fn known(ids: &[&str]) -> BTreeSet<CommitId> {
    ids.iter().map(|id| CommitId::new(*id)).collect()
}

// ============================================================================
// SECTION: Bounded Reads
// ============================================================================

#[test]
fn read_bytes_with_limit_accepts_small_file() {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(b"<coverage/>").expect("write");
    let bytes = read_bytes_with_limit(file.path(), 64).expect("read");
    assert_eq!(bytes, b"<coverage/>");
}

#[test]
fn read_bytes_with_limit_rejects_oversized_file() {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(&[b'x'; 65]).expect("write");
    match read_bytes_with_limit(file.path(), 64) {
        Err(ReadLimitError::TooLarge {
            size,
            limit,
        }) => {
            assert_eq!(size, 65);
            assert_eq!(limit, 64);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn read_bytes_with_limit_reports_missing_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = read_bytes_with_limit(&dir.path().join("coverage.xml"), 64);
    assert!(matches!(result, Err(ReadLimitError::Io(_))));
}

// ============================================================================
// SECTION: Prefix Resolution
// ============================================================================

#[test]
fn resolve_prefix_finds_unique_match() {
    let known = known(&["abc123", "def456"]);
    let found = resolve_prefix(&known, "de").expect("resolve");
    assert_eq!(found, Some(CommitId::new("def456")));
}

#[test]
fn resolve_prefix_returns_none_without_match() {
    let known = known(&["abc123"]);
    assert_eq!(resolve_prefix(&known, "ff").expect("resolve"), None);
}

#[test]
fn resolve_prefix_rejects_ambiguous_and_empty_prefixes() {
    let known = known(&["abc123", "abd456"]);
    let err = resolve_prefix(&known, "ab").expect_err("ambiguous");
    assert!(err.to_string().contains("ambiguous"));
    assert!(resolve_prefix(&known, "  ").is_err());
}

// ============================================================================
// SECTION: Argument Parsing
// ============================================================================

#[test]
fn check_accepts_negative_hard_minimum_and_overrides() {
    let cli = Cli::try_parse_from([
        "ccguard",
        "check",
        "coverage.xml",
        "--target-branch",
        "main",
        "--hard-minimum",
        "-1",
        "--tolerance",
        "0.05",
        "--consider-uncommitted-changes",
    ])
    .expect("parse");
    let Commands::Check(command) = cli.command else {
        panic!("expected check command");
    };
    assert_eq!(command.target_branch.as_deref(), Some("main"));
    assert_eq!(command.thresholds.hard_minimum, Some(-1.0));
    assert_eq!(command.thresholds.tolerance, Some(0.05));
    assert!(command.consider_uncommitted_changes);
    assert_eq!(command.location.repository.to_str(), Some("."));
}

#[test]
fn log_defaults_to_thirty_commits() {
    let cli = Cli::try_parse_from(["ccguard", "--debug", "log"]).expect("parse");
    assert!(cli.debug);
    let Commands::Log(command) = cli.command else {
        panic!("expected log command");
    };
    assert_eq!(command.limit, 30);
}

#[test]
fn sync_requires_source_and_destination() {
    assert!(Cli::try_parse_from(["ccguard", "sync", "sqlite"]).is_err());
    let cli = Cli::try_parse_from(["ccguard", "sync", "sqlite", "web", "--commit-id", "abc"])
        .expect("parse");
    let Commands::Sync(command) = cli.command else {
        panic!("expected sync command");
    };
    assert_eq!(command.source, "sqlite");
    assert_eq!(command.dest, "web");
    assert_eq!(command.commit_id.as_deref(), Some("abc"));
}

#[test]
fn flag_thresholds_override_configuration() {
    let overrides = ThresholdArgs {
        tolerance: Some(0.1),
        hard_minimum: None,
    };
    let thresholds = resolve_thresholds(&overrides, 0.0, 0.5).expect("thresholds");
    assert_eq!(thresholds, RegressionThresholds::new(0.1, 0.5).expect("thresholds"));
    let invalid = ThresholdArgs {
        tolerance: Some(-1.0),
        hard_minimum: None,
    };
    assert!(resolve_thresholds(&invalid, 0.0, -1.0).is_err());
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

#[test]
fn coverage_table_lists_files_and_total() {
    let report = report(&[("a.py", &[(1, 1), (2, 0)]), ("b.py", &[(1, 3)])]);
    let lines = render::coverage_table(&report);
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("Filename"));
    assert!(lines[2].starts_with("a.py"));
    assert!(lines[2].ends_with("50.00%"));
    assert!(lines[4].starts_with("TOTAL"));
    assert!(lines[4].ends_with("66.67%"));
}

#[test]
fn coverage_table_omits_details_for_large_reports() {
    let lines: &[(u64, u64)] = &[(1, 1)];
    let classes: Vec<(String, &[(u64, u64)])> =
        (0 .. 6).map(|index| (format!("f{index}.py"), lines)).collect();
    let borrowed: Vec<(&str, &[(u64, u64)])> =
        classes.iter().map(|(name, lines)| (name.as_str(), *lines)).collect();
    let rendered = render::coverage_table(&report(&borrowed));
    assert_eq!(rendered[2], "..details omitted..");
    assert!(rendered[3].starts_with("TOTAL"));
}

#[test]
fn regression_verdict_lists_violations() {
    let reference = report(&[("a.py", &[(1, 1), (2, 1)])]);
    let challenger = report(&[("a.py", &[(1, 1), (2, 0)])]);
    let diff = CoberturaDiff::new(reference, challenger);
    let outcome = evaluate_regression(&diff, &RegressionThresholds::new(0.0, -1.0).expect("ok"));
    let lines = render::verdict_lines(&diff, &outcome);
    assert_eq!(lines[0], "Hey, there's still some unit testing to do before merging.");
    assert!(lines[1].starts_with("  - a.py: below reference"));

    let table = render::delta_table(&diff);
    assert!(table.iter().any(|line| line.starts_with("a.py") && line.ends_with("-50.00%")));
}

#[test]
fn improvement_verdict_celebrates_covered_code() {
    let reference = report(&[("a.py", &[(1, 1), (2, 0)])]);
    let challenger = report(&[("a.py", &[(1, 1), (2, 1), (3, 1)])]);
    let diff = CoberturaDiff::new(reference, challenger);
    let outcome = evaluate_regression(&diff, &RegressionThresholds::new(0.0, -1.0).expect("ok"));
    let lines = render::verdict_lines(&diff, &outcome);
    assert!(lines[0].starts_with("Congratulations!"));
    assert!(lines.contains(&"Huge! All of your new code is fully covered!".to_string()));
    assert!(lines.iter().any(|line| line.starts_with("Kudos!")));
}

#[test]
fn log_line_marks_recorded_commits() {
    let commit = CommitId::new("0123456789abcdef");
    let summary = CoverageSummary {
        line_rate: 0.875,
        lines_covered: 7,
        lines_valid: 8,
    };
    let recorded = render::log_line(&commit, "Add parser", true, Some(&summary));
    assert_eq!(recorded, "✅  (87.50%) 0123456 Add parser");
    let missing = render::log_line(&commit, &"x".repeat(80), false, None);
    assert!(missing.starts_with(&format!("❌{}0123456 ", " ".repeat(11))));
    assert_eq!(missing.chars().filter(|c| *c == 'x').count(), 70);
}
