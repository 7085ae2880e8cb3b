// crates/ccguard-cobertura/src/lib.rs
// ============================================================================
// Module: ccguard Cobertura Reports
// Description: Cobertura XML parsing and structural report diffs.
// Purpose: Feed per-file coverage figures to the regression policy.
// Dependencies: ccguard-core, roxmltree
// ============================================================================

//! ## Overview
//! [`CoberturaReport`] implements [`ccguard_core::CoverageReport`] and
//! [`CoberturaDiff`] implements [`ccguard_core::CoverageDiff`]. Coverage is
//! aggregated per file from `<class>` line records; several classes may
//! contribute lines to one file.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod diff;
pub mod report;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use diff::CoberturaDiff;
pub use report::CoberturaReport;
pub use report::FileCoverage;
