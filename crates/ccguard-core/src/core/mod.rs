// crates/ccguard-core/src/core/mod.rs
// ============================================================================
// Module: ccguard Core Types
// Description: Identifiers, reference records, digests, and summaries.
// Purpose: Group the data model shared by every ccguard crate.
// Dependencies: crate::core::{hashing, identifiers, reference, summary}
// ============================================================================

//! ## Overview
//! The data model is deliberately small: identifiers, the reference record
//! exchanged with stores, and the precomputed totals used for badges.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod hashing;
pub mod identifiers;
pub mod reference;
pub mod summary;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::BranchName;
pub use identifiers::CommitId;
pub use identifiers::DEFAULT_SUBTYPE;
pub use identifiers::IdentifierError;
pub use identifiers::RepositoryId;
pub use identifiers::Subtype;
pub use reference::CommitQuery;
pub use reference::CoverageSummary;
pub use reference::DumpedReference;
pub use reference::NewReference;
pub use reference::PersistOutcome;
pub use summary::summarize_payload;
