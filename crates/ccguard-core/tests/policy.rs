// crates/ccguard-core/tests/policy.rs
// ============================================================================
// Module: Regression Policy Tests
// Description: Tolerance, hard minimum, shrink exemption, and new-file rules.
// Purpose: Pin the pass/fail boundaries of the regression check.
// Dependencies: ccguard-core
// ============================================================================
//! ## Overview
//! Uses exact binary fractions (1.0, 0.75, 0.5) so that boundary checks are
//! not at the mercy of floating-point rounding.

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
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use ccguard_core::PolicyError;
use ccguard_core::RegressionThresholds;
use ccguard_core::ViolationKind;
use ccguard_core::evaluate_regression;
use ccguard_core::has_better_coverage;
use common::FakeDiff;

fn thresholds(tolerance: f64, hard_minimum: f64) -> RegressionThresholds {
    RegressionThresholds::new(tolerance, hard_minimum).unwrap()
}

#[test]
fn identical_reports_pass() {
    let diff = FakeDiff::new(&[("a.py", 4, 1)], &[("a.py", 4, 1)]);
    assert!(has_better_coverage(&diff, &thresholds(0.0, -1.0)));
}

#[test]
fn fewer_misses_everywhere_takes_fast_path_even_below_hard_minimum() {
    let diff = FakeDiff::new(&[("a.py", 4, 3)], &[("a.py", 4, 2)]);
    let outcome = evaluate_regression(&diff, &thresholds(0.0, 0.9));
    assert!(outcome.improved);
    assert!(outcome.violations.is_empty());
}

#[test]
fn drop_within_tolerance_passes_at_boundary() {
    let diff = FakeDiff::new(&[("a.py", 4, 0)], &[("a.py", 4, 1)]);
    assert!(has_better_coverage(&diff, &thresholds(0.25, -1.0)));
}

#[test]
fn drop_beyond_tolerance_fails() {
    let diff = FakeDiff::new(&[("a.py", 4, 0)], &[("a.py", 4, 2)]);
    let outcome = evaluate_regression(&diff, &thresholds(0.25, -1.0));
    assert!(!outcome.improved);
    assert_eq!(outcome.violations.len(), 1);
    let violation = &outcome.violations[0];
    assert_eq!(violation.file, "a.py");
    assert_eq!(violation.kind, ViolationKind::FileBelowReference);
    assert!((violation.observed - 0.5).abs() < f64::EPSILON);
    assert!((violation.threshold - 0.75).abs() < f64::EPSILON);
}

#[test]
fn eighty_percent_reference_with_five_point_tolerance_accepts_seventy_five() {
    // 16/20 = 0.80 against 15/20 = 0.75; 0.80 - 0.05 evaluates to exactly 0.75.
    let diff = FakeDiff::new(&[("a.py", 20, 4)], &[("a.py", 20, 5)]);
    let outcome = evaluate_regression(&diff, &thresholds(0.05, -1.0));
    assert!(outcome.improved, "unexpected violations: {:?}", outcome.violations);
}

#[test]
fn eighty_percent_reference_with_five_point_tolerance_rejects_seventy() {
    let diff = FakeDiff::new(&[("a.py", 20, 4)], &[("a.py", 20, 6)]);
    let outcome = evaluate_regression(&diff, &thresholds(0.05, -1.0));
    assert!(!outcome.improved);
    assert_eq!(outcome.violations.len(), 1);
    assert_eq!(outcome.violations[0].kind, ViolationKind::FileBelowReference);
    assert!((outcome.violations[0].observed - 0.7).abs() < 1e-12);
}

#[test]
fn seventy_five_fails_when_tolerance_is_only_four_points() {
    let diff = FakeDiff::new(&[("a.py", 20, 4)], &[("a.py", 20, 5)]);
    assert!(!has_better_coverage(&diff, &thresholds(0.04, -1.0)));
}

#[test]
fn zero_tolerance_fails_on_any_drop() {
    let diff = FakeDiff::new(&[("a.py", 4, 0)], &[("a.py", 4, 1)]);
    assert!(!has_better_coverage(&diff, &thresholds(0.0, -1.0)));
}

#[test]
fn shrunk_file_without_new_misses_is_exempt() {
    // a.py loses statements and its rate drops from 0.75 to 0.5; b.py breaks
    // the fast path but stays within tolerance.
    let diff = FakeDiff::new(
        &[("a.py", 8, 2), ("b.py", 4, 0)],
        &[("a.py", 4, 2), ("b.py", 4, 1)],
    );
    let outcome = evaluate_regression(&diff, &thresholds(0.25, -1.0));
    assert!(outcome.improved, "unexpected violations: {:?}", outcome.violations);
}

#[test]
fn shrunk_file_with_new_misses_is_not_exempt() {
    let diff = FakeDiff::new(&[("a.py", 8, 2)], &[("a.py", 4, 3)]);
    let outcome = evaluate_regression(&diff, &thresholds(0.25, -1.0));
    assert!(!outcome.improved);
    assert_eq!(outcome.violations[0].kind, ViolationKind::FileBelowReference);
}

#[test]
fn hard_minimum_applies_to_shrink_exempt_files() {
    let diff = FakeDiff::new(
        &[("a.py", 8, 2), ("b.py", 4, 0)],
        &[("a.py", 4, 2), ("b.py", 4, 1)],
    );
    let outcome = evaluate_regression(&diff, &thresholds(0.25, 0.6));
    assert!(!outcome.improved);
    assert_eq!(outcome.violations.len(), 1);
    assert_eq!(outcome.violations[0].file, "a.py");
    assert_eq!(outcome.violations[0].kind, ViolationKind::BelowHardMinimum);
}

#[test]
fn hard_minimum_fails_even_within_tolerance() {
    let diff = FakeDiff::new(&[("a.py", 4, 1)], &[("a.py", 4, 2)]);
    let outcome = evaluate_regression(&diff, &thresholds(1.0, 0.6));
    assert!(!outcome.improved);
    assert_eq!(outcome.violations.len(), 1);
    assert_eq!(outcome.violations[0].kind, ViolationKind::BelowHardMinimum);
}

#[test]
fn new_file_below_reference_total_fails() {
    // Reference total is 0.75; the new file sits at 0.5.
    let diff = FakeDiff::new(&[("a.py", 4, 1)], &[("a.py", 4, 1), ("new.py", 4, 2)]);
    let outcome = evaluate_regression(&diff, &thresholds(0.0, -1.0));
    assert!(!outcome.improved);
    assert_eq!(outcome.violating_files().into_iter().collect::<Vec<_>>(), vec!["new.py"]);
    assert_eq!(outcome.violations[0].kind, ViolationKind::NewFileBelowReference);
}

#[test]
fn new_file_at_reference_total_passes() {
    let diff = FakeDiff::new(&[("a.py", 4, 1)], &[("a.py", 4, 1), ("new.py", 4, 1)]);
    assert!(has_better_coverage(&diff, &thresholds(0.0, -1.0)));
}

#[test]
fn every_violation_is_reported() {
    let diff = FakeDiff::new(
        &[("a.py", 4, 0), ("b.py", 4, 0)],
        &[("a.py", 4, 2), ("b.py", 4, 2), ("c.py", 4, 4)],
    );
    let outcome = evaluate_regression(&diff, &thresholds(0.0, -1.0));
    assert_eq!(outcome.violations.len(), 3);
    assert_eq!(outcome.violating_files().len(), 3);
}

#[test]
fn violation_display_names_file_and_rates() {
    let diff = FakeDiff::new(&[("a.py", 4, 0)], &[("a.py", 4, 2)]);
    let outcome = evaluate_regression(&diff, &thresholds(0.0, -1.0));
    assert_eq!(outcome.violations[0].to_string(), "a.py: below reference (0.5000 < 1.0000)");
}

#[test]
fn thresholds_reject_invalid_values() {
    assert_eq!(RegressionThresholds::new(-0.1, -1.0), Err(PolicyError::InvalidTolerance(-0.1)));
    assert!(matches!(
        RegressionThresholds::new(f64::NAN, -1.0),
        Err(PolicyError::InvalidTolerance(_))
    ));
    assert_eq!(RegressionThresholds::new(0.0, 1.5), Err(PolicyError::InvalidHardMinimum(1.5)));
}

#[test]
fn negative_hard_minimum_disables_floor() {
    assert_eq!(thresholds(0.1, -1.0).hard_minimum, None);
    assert_eq!(thresholds(0.1, 0.0).hard_minimum, Some(0.0));
}
