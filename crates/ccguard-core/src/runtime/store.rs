// crates/ccguard-core/src/runtime/store.rs
// ============================================================================
// Module: ccguard In-Memory Store
// Description: Simple in-memory reference store for tests and dry runs.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides an in-memory implementation of [`ReferenceStore`]
//! that honors the full listing contract (newest first, branch and limit
//! filters). It backs workflow tests and `--dry-run` style usage; it is not
//! intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::BranchName;
use crate::core::CommitId;
use crate::core::CommitQuery;
use crate::core::CoverageSummary;
use crate::core::DumpedReference;
use crate::core::NewReference;
use crate::core::PersistOutcome;
use crate::core::Subtype;
use crate::core::summarize_payload;
use crate::interfaces::ReferenceStore;
use crate::interfaces::StoreError;
use crate::interfaces::validate_new_reference;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Stored record with its insertion sequence.
#[derive(Debug, Clone)]
struct StoredReference {
    /// Monotonic insertion order, standing in for a collection timestamp.
    sequence: u64,
    /// Branch recorded at persist time.
    branch: Option<BranchName>,
    /// Payload bytes.
    payload: Vec<u8>,
    /// Totals computed at persist time.
    summary: CoverageSummary,
}

/// Map contents guarded by the store mutex.
#[derive(Debug, Default)]
struct StoreState {
    /// Next insertion sequence.
    next_sequence: u64,
    /// Records keyed by commit and subtype.
    records: BTreeMap<(CommitId, Subtype), StoredReference>,
}

/// In-memory reference store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryReferenceStore {
    /// Store state protected by a mutex.
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryReferenceStore {
    /// Creates an empty in-memory reference store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the store state.
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("reference store mutex poisoned".to_string()))
    }
}

impl ReferenceStore for InMemoryReferenceStore {
    fn list_commits(&self, query: &CommitQuery) -> Result<Vec<CommitId>, StoreError> {
        let guard = self.lock()?;
        let mut matches: Vec<(u64, &CommitId)> = guard
            .records
            .iter()
            .filter(|((_, subtype), _)| query.subtype.as_ref().is_none_or(|want| want == subtype))
            .filter(|(_, record)| {
                query.branch.as_ref().is_none_or(|want| record.branch.as_ref() == Some(want))
            })
            .map(|((commit, _), record)| (record.sequence, commit))
            .collect();
        matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        let mut seen: BTreeSet<&CommitId> = BTreeSet::new();
        let mut commits: Vec<CommitId> = Vec::new();
        for (_, commit) in matches {
            if seen.insert(commit) {
                commits.push(commit.clone());
            }
        }
        if let Some(limit) = query.limit {
            commits.truncate(limit);
        }
        Ok(commits)
    }

    fn retrieve(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self.lock()?;
        let key = (commit_id.clone(), subtype.clone());
        Ok(guard.records.get(&key).map(|record| record.payload.clone()))
    }

    fn persist(&self, reference: &NewReference) -> Result<PersistOutcome, StoreError> {
        validate_new_reference(reference)?;
        let key = (reference.commit_id.clone(), reference.subtype.clone());
        let mut guard = self.lock()?;
        if guard.records.contains_key(&key) {
            return Ok(PersistOutcome::AlreadyExists);
        }
        let sequence = guard.next_sequence;
        guard.next_sequence += 1;
        guard.records.insert(
            key,
            StoredReference {
                sequence,
                branch: reference.branch.clone(),
                payload: reference.payload.clone(),
                summary: summarize_payload(&reference.payload),
            },
        );
        drop(guard);
        Ok(PersistOutcome::Stored)
    }

    fn dump(&self) -> Result<Vec<DumpedReference>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .records
            .iter()
            .map(|((commit_id, subtype), record)| DumpedReference {
                commit_id: commit_id.clone(),
                subtype: subtype.clone(),
                branch: record.branch.clone(),
                payload: record.payload.clone(),
            })
            .collect())
    }

    fn record(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<DumpedReference>, StoreError> {
        let guard = self.lock()?;
        let key = (commit_id.clone(), subtype.clone());
        Ok(guard.records.get(&key).map(|record| DumpedReference {
            commit_id: commit_id.clone(),
            subtype: subtype.clone(),
            branch: record.branch.clone(),
            payload: record.payload.clone(),
        }))
    }

    fn summary(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<CoverageSummary>, StoreError> {
        let guard = self.lock()?;
        let key = (commit_id.clone(), subtype.clone());
        Ok(guard.records.get(&key).map(|record| record.summary))
    }
}
