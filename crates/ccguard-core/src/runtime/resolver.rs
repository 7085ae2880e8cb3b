// crates/ccguard-core/src/runtime/resolver.rs
// ============================================================================
// Module: ccguard Parent Resolver
// Description: Finds the nearest ancestor commit with a stored reference.
// Purpose: Walk paged history lazily without loading it into memory.
// Dependencies: crate::core, tracing
// ============================================================================

//! ## Overview
//! Ancestor enumeration is paged upstream, so resolution is two-level: pull
//! one window, scan it nearest-first, and only pull the next window when the
//! current one holds no recorded commit. An empty window ends the walk.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use tracing::debug;

use crate::core::CommitId;

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Returns the first commit of `batches` that appears in `known`.
///
/// Batches are pulled on demand. When `known` is empty no batch is pulled.
pub fn determine_parent_commit<I, B>(known: &BTreeSet<CommitId>, batches: I) -> Option<CommitId>
where
    I: IntoIterator<Item = B>,
    B: IntoIterator<Item = CommitId>,
{
    let outcome: Result<Option<CommitId>, std::convert::Infallible> =
        try_determine_parent_commit(known, batches.into_iter().map(Ok));
    match outcome {
        Ok(found) => found,
        Err(never) => match never {},
    }
}

/// Fallible variant of [`determine_parent_commit`] for history sources that
/// can fail mid-walk.
///
/// # Errors
///
/// Returns the first error produced by the batch source.
pub fn try_determine_parent_commit<I, B, E>(
    known: &BTreeSet<CommitId>,
    batches: I,
) -> Result<Option<CommitId>, E>
where
    I: IntoIterator<Item = Result<B, E>>,
    B: IntoIterator<Item = CommitId>,
{
    if known.is_empty() {
        return Ok(None);
    }
    for (index, batch) in batches.into_iter().enumerate() {
        let mut scanned = 0_usize;
        for commit in batch? {
            scanned += 1;
            if known.contains(&commit) {
                debug!(commit = %commit, batch = index, "reference commit found");
                return Ok(Some(commit));
            }
        }
        if scanned == 0 {
            break;
        }
        debug!(batch = index, scanned, "no reference in batch");
    }
    Ok(None)
}
