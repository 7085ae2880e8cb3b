// crates/ccguard-cli/src/render.rs
// ============================================================================
// Module: CLI Text Rendering
// Description: Plain-text coverage tables, verdicts, and log lines.
// Purpose: Build user-facing output as lines; writing is left to the caller.
// Dependencies: ccguard-core
// ============================================================================

//! ## Overview
//! Every renderer returns owned lines so commands can write them through the
//! stdout helpers and tests can assert on them directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use ccguard_core::CommitId;
use ccguard_core::ComparisonOutcome;
use ccguard_core::CoverageDiff;
use ccguard_core::CoverageReport;
use ccguard_core::CoverageSummary;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Above this many files the coverage table collapses to its total.
const MAX_DETAILED_FILES: usize = 5;
/// Maximum characters of a commit subject shown by `log`.
const MAX_SUBJECT_CHARS: usize = 70;

// ============================================================================
// SECTION: Coverage Tables
// ============================================================================

/// Renders the per-file coverage table of one report.
pub(crate) fn coverage_table(report: &dyn CoverageReport) -> Vec<String> {
    let files = report.files();
    let width = column_width(&files);
    let mut lines = vec![
        format!("{:<width$}  {:>7}  {:>6}  {:>7}", "Filename", "Stmts", "Miss", "Cover"),
        format!("{}  {}  {}  {}", "-".repeat(width), "-".repeat(7), "-".repeat(6), "-".repeat(7)),
    ];
    if files.len() > MAX_DETAILED_FILES {
        lines.push("..details omitted..".to_string());
    } else {
        for file in &files {
            lines.push(format!(
                "{file:<width$}  {:>7}  {:>6}  {:>6.2}%",
                report.statements(Some(file)),
                report.misses(Some(file)),
                report.file_line_rate(file).unwrap_or(1.0) * 100.0
            ));
        }
    }
    lines.push(format!(
        "{:<width$}  {:>7}  {:>6}  {:>6.2}%",
        "TOTAL",
        report.statements(None),
        report.misses(None),
        report.line_rate() * 100.0
    ));
    lines
}

/// Renders per-file changes between the reference and challenger sides.
///
/// Files whose statement and miss counts are unchanged are left out.
pub(crate) fn delta_table(diff: &dyn CoverageDiff) -> Vec<String> {
    let reference = diff.reference();
    let challenger = diff.challenger();
    let files: BTreeSet<String> = reference.files().union(&challenger.files()).cloned().collect();
    let width = column_width(&files);
    let mut lines = vec![
        format!("{:<width$}  {:>7}  {:>6}  {:>8}", "Filename", "Stmts", "Miss", "Cover"),
        format!("{}  {}  {}  {}", "-".repeat(width), "-".repeat(7), "-".repeat(6), "-".repeat(8)),
    ];
    for file in &files {
        let statements = diff.statements_delta(Some(file));
        let misses = diff.misses_delta(Some(file));
        if statements == 0 && misses == 0 {
            continue;
        }
        let cover = match (reference.file_line_rate(file), challenger.file_line_rate(file)) {
            (Some(before), Some(after)) => format!("{:>+7.2}%", (after - before) * 100.0),
            (None, Some(after)) => format!("{:>7.2}%", after * 100.0),
            _ => format!("{:>8}", "gone"),
        };
        lines.push(format!("{file:<width$}  {statements:>+7}  {misses:>+6}  {cover}"));
    }
    lines.push(format!(
        "{:<width$}  {:>+7}  {:>+6}  {:>+7.2}%",
        "TOTAL",
        diff.statements_delta(None),
        diff.misses_delta(None),
        (challenger.line_rate() - reference.line_rate()) * 100.0
    ));
    lines
}

/// Returns the filename column width.
fn column_width(files: &BTreeSet<String>) -> usize {
    files.iter().map(|file| file.chars().count()).max().unwrap_or(0).max("Filename".len())
}

// ============================================================================
// SECTION: Verdicts
// ============================================================================

/// Renders the pass/fail verdict with every violation and the bonus notes.
pub(crate) fn verdict_lines(diff: &dyn CoverageDiff, outcome: &ComparisonOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    if outcome.improved {
        lines.push(
            "Congratulations! You have improved the code coverage (or kept it stable).".to_string(),
        );
    } else {
        lines.push("Hey, there's still some unit testing to do before merging.".to_string());
        for violation in &outcome.violations {
            lines.push(format!("  - {violation}"));
        }
    }
    if diff.all_new_lines_covered() {
        lines.push("Huge! All of your new code is fully covered!".to_string());
    }
    if diff.misses_delta(None) < 0 {
        lines.push("Kudos! You have reduced the number of uncovered statements!".to_string());
    }
    lines
}

// ============================================================================
// SECTION: Log
// ============================================================================

/// Renders one `log` line: marker, stored rate, short id, and subject.
pub(crate) fn log_line(
    commit: &CommitId,
    subject: &str,
    recorded: bool,
    summary: Option<&CoverageSummary>,
) -> String {
    let marker = if recorded { "✅" } else { "❌" };
    let rate = summary.map_or_else(
        || " ".repeat(9),
        |summary| format!("({:5.2}%) ", summary.line_rate * 100.0),
    );
    let subject: String = subject.chars().take(MAX_SUBJECT_CHARS).collect();
    format!("{marker}  {rate}{} {subject}", commit.short())
}
