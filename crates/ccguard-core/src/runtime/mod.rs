// crates/ccguard-core/src/runtime/mod.rs
// ============================================================================
// Module: ccguard Runtime
// Description: Parent resolution, regression policy, and reference transfer.
// Purpose: Implement the backend-agnostic decisions of a coverage check.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules hold the decision logic shared by every entry point. They
//! consume the interfaces only, so each backend and report format gets the
//! same answers.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod policy;
pub mod resolver;
pub mod store;
pub mod sync;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use policy::ComparisonOutcome;
pub use policy::FileViolation;
pub use policy::PolicyError;
pub use policy::RegressionThresholds;
pub use policy::ViolationKind;
pub use policy::evaluate_regression;
pub use policy::has_better_coverage;
pub use resolver::determine_parent_commit;
pub use resolver::try_determine_parent_commit;
pub use store::InMemoryReferenceStore;
pub use sync::TransferReport;
pub use sync::transfer;
