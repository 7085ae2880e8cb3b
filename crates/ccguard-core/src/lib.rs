// crates/ccguard-core/src/lib.rs
// ============================================================================
// Module: ccguard Core Library
// Description: Public API surface for the ccguard core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! ccguard core decides whether the coverage of the current commit regressed
//! against the nearest ancestor that has a recorded reference. It is
//! backend-agnostic: stores, version control, and report formats plug in
//! through the traits in [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::ANCESTOR_PAGE_SIZE;
pub use interfaces::CommitBatches;
pub use interfaces::CoverageDiff;
pub use interfaces::CoverageReport;
pub use interfaces::ReferenceStore;
pub use interfaces::ReportError;
pub use interfaces::StoreError;
pub use interfaces::VcsError;
pub use interfaces::VersionControl;
pub use interfaces::validate_new_reference;
pub use runtime::ComparisonOutcome;
pub use runtime::FileViolation;
pub use runtime::InMemoryReferenceStore;
pub use runtime::PolicyError;
pub use runtime::RegressionThresholds;
pub use runtime::TransferReport;
pub use runtime::ViolationKind;
pub use runtime::determine_parent_commit;
pub use runtime::evaluate_regression;
pub use runtime::has_better_coverage;
pub use runtime::transfer;
pub use runtime::try_determine_parent_commit;
