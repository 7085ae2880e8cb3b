// crates/ccguard-core/src/runtime/policy.rs
// ============================================================================
// Module: ccguard Regression Policy
// Description: Decides whether a challenger report is an acceptable outcome.
// Purpose: Compare per-file coverage against a reference with tolerance and floor.
// Dependencies: crate::interfaces, thiserror, tracing
// ============================================================================

//! ## Overview
//! The policy first trusts the diff's own "improved or equal" verdict. When
//! that fails it evaluates every challenger file:
//! - new files must reach the reference total rate minus the tolerance;
//! - existing files must reach their reference rate minus the tolerance,
//!   unless the file shrank without gaining misses;
//! - every file must reach the hard minimum when one is configured.
//!
//! Each violation is logged with the observed and threshold rates and
//! returned to the caller; nothing is summarized away.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;
use tracing::debug;
use tracing::warn;

use crate::interfaces::CoverageDiff;

// ============================================================================
// SECTION: Thresholds
// ============================================================================

/// Threshold validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    /// Tolerance was negative or not finite.
    #[error("tolerance must be a finite value >= 0 (got {0})")]
    InvalidTolerance(f64),
    /// Hard minimum exceeded 1 or was not finite.
    #[error("hard minimum must be a finite value <= 1 (got {0})")]
    InvalidHardMinimum(f64),
}

/// Tolerance and floor applied to per-file rates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegressionThresholds {
    /// Allowed drop below the reference rate.
    pub tolerance: f64,
    /// Absolute floor; `None` disables it.
    pub hard_minimum: Option<f64>,
}

impl RegressionThresholds {
    /// Builds thresholds from raw values; a negative hard minimum disables it.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] for a negative or non-finite tolerance, or a
    /// non-finite hard minimum or one above 1.
    pub fn new(tolerance: f64, hard_minimum: f64) -> Result<Self, PolicyError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(PolicyError::InvalidTolerance(tolerance));
        }
        if !hard_minimum.is_finite() || hard_minimum > 1.0 {
            return Err(PolicyError::InvalidHardMinimum(hard_minimum));
        }
        Ok(Self {
            tolerance,
            hard_minimum: (hard_minimum >= 0.0).then_some(hard_minimum),
        })
    }
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Rule that a file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// New file below the reference total rate minus tolerance.
    NewFileBelowReference,
    /// Existing file below its own reference rate minus tolerance.
    FileBelowReference,
    /// File below the absolute floor.
    BelowHardMinimum,
}

/// A single failed comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct FileViolation {
    /// File path as reported.
    pub file: String,
    /// Rule that failed.
    pub kind: ViolationKind,
    /// Challenger rate for the file.
    pub observed: f64,
    /// Rate the file had to reach.
    pub threshold: f64,
}

impl fmt::Display for FileViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = match self.kind {
            ViolationKind::NewFileBelowReference => "new file below reference total",
            ViolationKind::FileBelowReference => "below reference",
            ViolationKind::BelowHardMinimum => "below hard minimum",
        };
        write!(f, "{}: {rule} ({:.4} < {:.4})", self.file, self.observed, self.threshold)
    }
}

/// Derived, non-persisted comparison result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComparisonOutcome {
    /// True when the challenger is an acceptable outcome.
    pub improved: bool,
    /// Every failed comparison, in file order.
    pub violations: Vec<FileViolation>,
}

impl ComparisonOutcome {
    /// Returns the set of files with at least one violation.
    #[must_use]
    pub fn violating_files(&self) -> BTreeSet<String> {
        self.violations.iter().map(|violation| violation.file.clone()).collect()
    }
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Returns true when the challenger side of `diff` is acceptable.
#[must_use]
pub fn has_better_coverage(diff: &dyn CoverageDiff, thresholds: &RegressionThresholds) -> bool {
    evaluate_regression(diff, thresholds).improved
}

/// Evaluates the regression policy and returns every violation found.
#[must_use]
pub fn evaluate_regression(
    diff: &dyn CoverageDiff,
    thresholds: &RegressionThresholds,
) -> ComparisonOutcome {
    if diff.improved_or_equal() {
        return ComparisonOutcome {
            improved: true,
            violations: Vec::new(),
        };
    }

    let reference = diff.reference();
    let challenger = diff.challenger();
    let reference_files = reference.files();
    let reference_total = reference.line_rate();
    let mut violations = Vec::new();

    for file in challenger.files() {
        let Some(observed) = challenger.file_line_rate(&file) else {
            continue;
        };
        if reference_files.contains(&file) {
            check_existing_file(diff, &file, observed, thresholds.tolerance, &mut violations);
        } else {
            let threshold = reference_total - thresholds.tolerance;
            if observed < threshold {
                record(
                    &mut violations,
                    file.clone(),
                    ViolationKind::NewFileBelowReference,
                    observed,
                    threshold,
                );
            }
        }
        if let Some(minimum) = thresholds.hard_minimum
            && observed < minimum
        {
            record(&mut violations, file, ViolationKind::BelowHardMinimum, observed, minimum);
        }
    }

    ComparisonOutcome {
        improved: violations.is_empty(),
        violations,
    }
}

/// Applies the tolerance rule to a file present on both sides.
fn check_existing_file(
    diff: &dyn CoverageDiff,
    file: &str,
    observed: f64,
    tolerance: f64,
    violations: &mut Vec<FileViolation>,
) {
    let misses_delta = diff.misses_delta(Some(file));
    let statements_delta = diff.statements_delta(Some(file));
    if misses_delta <= 0 && statements_delta < 0 {
        debug!(file, misses_delta, statements_delta, "file shrank without new misses");
        return;
    }
    let Some(reference_rate) = diff.reference().file_line_rate(file) else {
        return;
    };
    let threshold = reference_rate - tolerance;
    if observed < threshold {
        record(violations, file.to_string(), ViolationKind::FileBelowReference, observed, threshold);
    }
}

/// Logs and stores a violation.
fn record(
    violations: &mut Vec<FileViolation>,
    file: String,
    kind: ViolationKind,
    observed: f64,
    threshold: f64,
) {
    let violation = FileViolation {
        file,
        kind,
        observed,
        threshold,
    };
    warn!(
        file = %violation.file,
        observed = violation.observed,
        threshold = violation.threshold,
        "coverage regression: {violation}"
    );
    violations.push(violation);
}
