// crates/ccguard-core/src/runtime/sync.rs
// ============================================================================
// Module: ccguard Reference Transfer
// Description: Copies references between two reference stores.
// Purpose: Migrate or replicate references across backends idempotently.
// Dependencies: crate::core, crate::interfaces, tracing
// ============================================================================

//! ## Overview
//! Transfers rely on the duplicate-is-no-op persist contract, so a transfer
//! can be re-run after an interruption and records already present at the
//! destination are counted, not reported as failures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing::info;
use tracing::warn;

use crate::core::CommitId;
use crate::core::NewReference;
use crate::core::PersistOutcome;
use crate::core::Subtype;
use crate::interfaces::ReferenceStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Counters describing a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferReport {
    /// Records newly written to the destination.
    pub stored: usize,
    /// Records the destination already held.
    pub already_present: usize,
    /// Requested records the source does not hold.
    pub skipped: usize,
}

// ============================================================================
// SECTION: Transfer
// ============================================================================

/// Copies one commit (when given) or every record from `source` to `dest`.
///
/// # Errors
///
/// Returns [`StoreError`] when either backend fails for a reason other than
/// an existing record, including an [`StoreError::InvalidArgument`] raised by
/// the destination.
pub fn transfer(
    commit_id: Option<&CommitId>,
    subtype: &Subtype,
    source: &dyn ReferenceStore,
    dest: &dyn ReferenceStore,
) -> Result<TransferReport, StoreError> {
    let mut report = TransferReport::default();
    match commit_id {
        Some(commit_id) => {
            let Some(record) = source.record(commit_id, subtype)? else {
                warn!(commit = %commit_id, subtype = %subtype, "no reference to transfer");
                report.skipped += 1;
                return Ok(report);
            };
            copy_one(dest, &record.into_new_reference(), &mut report)?;
        }
        None => {
            for dumped in source.dump()? {
                copy_one(dest, &dumped.into_new_reference(), &mut report)?;
            }
        }
    }
    info!(
        stored = report.stored,
        already_present = report.already_present,
        skipped = report.skipped,
        "transfer complete"
    );
    Ok(report)
}

/// Persists one reference and updates the counters.
fn copy_one(
    dest: &dyn ReferenceStore,
    reference: &NewReference,
    report: &mut TransferReport,
) -> Result<(), StoreError> {
    match dest.persist(reference)? {
        PersistOutcome::Stored => report.stored += 1,
        PersistOutcome::AlreadyExists => report.already_present += 1,
    }
    Ok(())
}
