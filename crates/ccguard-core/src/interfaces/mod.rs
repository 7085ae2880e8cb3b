// crates/ccguard-core/src/interfaces/mod.rs
// ============================================================================
// Module: ccguard Interfaces
// Description: Backend-agnostic contracts for storage, history, and reports.
// Purpose: Define the seams between the core engine and its collaborators.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Interfaces describe how ccguard talks to reference stores, version
//! control, and coverage reports without embedding any backend. Every
//! [`ReferenceStore`] honors the same contract: duplicate persists are a
//! silent no-op, unknown commits are `Ok(None)`, and long-term pointers are
//! resolved before bytes leave the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::CommitId;
use crate::core::CommitQuery;
use crate::core::CoverageSummary;
use crate::core::DumpedReference;
use crate::core::NewReference;
use crate::core::PersistOutcome;
use crate::core::Subtype;

// ============================================================================
// SECTION: Reference Store
// ============================================================================

/// Reference store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller supplied an empty commit or payload.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// Stored data failed integrity checks.
    #[error("corrupt reference: {0}")]
    Corrupt(String),
    /// Local I/O failure.
    #[error("store io error: {0}")]
    Io(String),
    /// Backend engine reported an error.
    #[error("store error: {0}")]
    Store(String),
}

/// Persistence contract shared by every reference backend.
pub trait ReferenceStore {
    /// Lists commits that have a stored reference.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot be queried.
    fn list_commits(&self, query: &CommitQuery) -> Result<Vec<CommitId>, StoreError>;

    /// Returns the payload recorded for a commit, or `None` when unknown.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails or the payload is corrupt.
    fn retrieve(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<Vec<u8>>, StoreError>;

    /// Persists a reference; an existing key is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for empty commits or payloads,
    /// or another [`StoreError`] when the backend fails.
    fn persist(&self, reference: &NewReference) -> Result<PersistOutcome, StoreError>;

    /// Scans every record of the repository. Not for the regression hot path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot be scanned.
    fn dump(&self) -> Result<Vec<DumpedReference>, StoreError>;

    /// Returns the totals precomputed at persist time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn summary(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<CoverageSummary>, StoreError>;

    /// Returns one full record, branch included, or `None` when unknown.
    ///
    /// The default scans [`ReferenceStore::dump`]; backends with keyed
    /// access override it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails or the payload is corrupt.
    fn record(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<DumpedReference>, StoreError> {
        Ok(self
            .dump()?
            .into_iter()
            .find(|record| &record.commit_id == commit_id && &record.subtype == subtype))
    }

    /// Returns the set of commits recorded for a subtype.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot be queried.
    fn known_commits(&self, subtype: &Subtype) -> Result<BTreeSet<CommitId>, StoreError> {
        Ok(self.list_commits(&CommitQuery::for_subtype(subtype.clone()))?.into_iter().collect())
    }
}

/// Rejects persist requests every backend must refuse.
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] for an empty commit id or payload.
pub fn validate_new_reference(reference: &NewReference) -> Result<(), StoreError> {
    if reference.commit_id.is_empty() {
        return Err(StoreError::InvalidArgument("commit id must not be empty".to_string()));
    }
    if reference.payload.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "empty payload for commit {}",
            reference.commit_id
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Version Control
// ============================================================================

/// Default window size for ancestor enumeration.
pub const ANCESTOR_PAGE_SIZE: usize = 100;

/// Version-control errors.
#[derive(Debug, Error)]
pub enum VcsError {
    /// Repository could not be opened.
    #[error("repository unavailable: {0}")]
    Repository(String),
    /// A ref or revision could not be resolved.
    #[error("unknown revision: {0}")]
    UnknownRevision(String),
    /// History traversal failed.
    #[error("history walk failed: {0}")]
    Walk(String),
}

/// Lazy, fallible stream of nearest-first commit windows.
pub type CommitBatches<'a> = Box<dyn Iterator<Item = Result<Vec<CommitId>, VcsError>> + 'a>;

/// Version-control collaborator consumed by the check workflow.
pub trait VersionControl {
    /// Returns the root commit that identifies the repository.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when history cannot be read.
    fn repository_root_commit(&self) -> Result<CommitId, VcsError>;

    /// Returns the commit checked out at `HEAD`.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when `HEAD` cannot be resolved.
    fn current_commit(&self) -> Result<CommitId, VcsError>;

    /// Returns the merge base of `branch` and `reference`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when either side cannot be resolved.
    fn merge_base(&self, branch: &str, reference: &str) -> Result<Option<CommitId>, VcsError>;

    /// Returns the first parent of a commit, or `None` for a root commit.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when the commit cannot be resolved.
    fn first_parent(&self, commit: &CommitId) -> Result<Option<CommitId>, VcsError>;

    /// Enumerates ancestors of `refs` (inclusive) in windows of `page_size`.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when a ref cannot be resolved.
    fn ancestor_batches(
        &self,
        refs: &[String],
        page_size: usize,
    ) -> Result<CommitBatches<'_>, VcsError>;

    /// Lists files tracked by the repository, relative to its root.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when the index cannot be read.
    fn tracked_files(&self) -> Result<BTreeSet<String>, VcsError>;

    /// Returns the working-tree root.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] for bare repositories.
    fn root_path(&self) -> Result<PathBuf, VcsError>;
}

// ============================================================================
// SECTION: Coverage Reports
// ============================================================================

/// Coverage report errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Report could not be parsed.
    #[error("corrupt coverage payload: {0}")]
    Corrupt(String),
}

/// Per-file and total coverage figures of one parsed report.
pub trait CoverageReport {
    /// Returns the file paths known to the report.
    fn files(&self) -> BTreeSet<String>;

    /// Returns the total line rate.
    fn line_rate(&self) -> f64;

    /// Returns the line rate of one file.
    fn file_line_rate(&self, file: &str) -> Option<f64>;

    /// Returns the statement count of one file, or the total when `None`.
    fn statements(&self, file: Option<&str>) -> u64;

    /// Returns the missed statement count of one file, or the total when `None`.
    fn misses(&self, file: Option<&str>) -> u64;
}

/// Structural comparison between a reference and a challenger report.
pub trait CoverageDiff {
    /// Returns the reference side.
    fn reference(&self) -> &dyn CoverageReport;

    /// Returns the challenger side.
    fn challenger(&self) -> &dyn CoverageReport;

    /// Returns true when every line absent from the reference is covered.
    fn all_new_lines_covered(&self) -> bool;

    /// Returns true when no challenger file gained missed statements.
    fn improved_or_equal(&self) -> bool {
        self.challenger().files().iter().all(|file| self.misses_delta(Some(file)) <= 0)
    }

    /// Returns the change in missed statements (challenger minus reference).
    fn misses_delta(&self, file: Option<&str>) -> i64 {
        signed_delta(self.reference().misses(file), self.challenger().misses(file))
    }

    /// Returns the change in statements (challenger minus reference).
    fn statements_delta(&self, file: Option<&str>) -> i64 {
        signed_delta(self.reference().statements(file), self.challenger().statements(file))
    }
}

/// Returns `after - before` as a saturating signed value.
fn signed_delta(before: u64, after: u64) -> i64 {
    if after >= before {
        i64::try_from(after - before).unwrap_or(i64::MAX)
    } else {
        i64::try_from(before - after).map_or(i64::MIN, |value| -value)
    }
}
