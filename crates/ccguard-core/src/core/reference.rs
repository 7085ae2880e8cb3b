// crates/ccguard-core/src/core/reference.rs
// ============================================================================
// Module: ccguard Reference Records
// Description: Reference records, persist requests, and listing queries.
// Purpose: Define the data exchanged with every reference store backend.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! A reference is the coverage snapshot recorded for one commit. Records are
//! immutable once written; only the use counter moves and the payload may be
//! redirected to long-term storage without changing its content.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::BranchName;
use crate::core::identifiers::CommitId;
use crate::core::identifiers::Subtype;

// ============================================================================
// SECTION: Coverage Summary
// ============================================================================

/// Totals precomputed from a payload at persist time.
///
/// # Invariants
/// - `line_rate` lies in `[0, 1]` for well-formed payloads.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Covered lines divided by valid lines.
    pub line_rate: f64,
    /// Number of covered lines.
    pub lines_covered: u64,
    /// Number of valid (instrumented) lines.
    pub lines_valid: u64,
}

impl CoverageSummary {
    /// Returns the line rate as a whole percentage clamped to `0..=100`.
    #[must_use]
    pub fn percent(&self) -> u8 {
        let scaled = (self.line_rate * 100.0).round().clamp(0.0, 100.0);
        // Clamped above, the conversion is exact.
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "value is clamped to 0..=100 before conversion"
        )]
        let percent = scaled as u8;
        percent
    }
}

// ============================================================================
// SECTION: Persist Requests
// ============================================================================

/// Request to persist a new reference.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReference {
    /// Commit the snapshot was measured on.
    pub commit_id: CommitId,
    /// Measurement subtype.
    pub subtype: Subtype,
    /// Branch the commit was measured on, when known.
    pub branch: Option<BranchName>,
    /// Serialized coverage snapshot.
    pub payload: Vec<u8>,
}

impl NewReference {
    /// Creates a request for the default subtype without a branch.
    #[must_use]
    pub fn new(commit_id: impl Into<CommitId>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            commit_id: commit_id.into(),
            subtype: Subtype::default(),
            branch: None,
            payload: payload.into(),
        }
    }

    /// Sets the measurement subtype.
    #[must_use]
    pub fn with_subtype(mut self, subtype: Subtype) -> Self {
        self.subtype = subtype;
        self
    }

    /// Sets the branch name.
    #[must_use]
    pub fn with_branch(mut self, branch: Option<BranchName>) -> Self {
        self.branch = branch;
        self
    }
}

/// Outcome of a persist call. Neither variant is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// A new record was written.
    Stored,
    /// A record with the same key already existed and was left untouched.
    AlreadyExists,
}

// ============================================================================
// SECTION: Queries and Dumps
// ============================================================================

/// Filters for listing recorded commits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitQuery {
    /// Restrict to a measurement subtype (all subtypes when absent).
    pub subtype: Option<Subtype>,
    /// Restrict to a branch (honored only by ordering-capable backends).
    pub branch: Option<BranchName>,
    /// Maximum number of commits, newest first (ordering-capable backends).
    pub limit: Option<usize>,
}

impl CommitQuery {
    /// Lists every commit recorded for a subtype.
    #[must_use]
    pub fn for_subtype(subtype: Subtype) -> Self {
        Self {
            subtype: Some(subtype),
            ..Self::default()
        }
    }

    /// Returns the most recent commit recorded on a branch.
    #[must_use]
    pub fn latest_on(branch: Option<BranchName>, subtype: Option<Subtype>) -> Self {
        Self {
            subtype,
            branch,
            limit: Some(1),
        }
    }
}

/// A full record as returned by a backend scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpedReference {
    /// Commit identifier.
    pub commit_id: CommitId,
    /// Measurement subtype.
    pub subtype: Subtype,
    /// Branch, when the backend records it.
    pub branch: Option<BranchName>,
    /// Raw payload bytes (long-term pointers already resolved).
    pub payload: Vec<u8>,
}

impl DumpedReference {
    /// Converts the dump entry back into a persist request.
    #[must_use]
    pub fn into_new_reference(self) -> NewReference {
        NewReference {
            commit_id: self.commit_id,
            subtype: self.subtype,
            branch: self.branch,
            payload: self.payload,
        }
    }
}
