// crates/ccguard-store-redis/src/store.rs
// ============================================================================
// Module: Redis Reference Store
// Description: ReferenceStore over Redis hashes.
// Purpose: Persist references with O(1) writes and reads per commit.
// Dependencies: ccguard-core, serde, serde_json, thiserror, time, tracing
// ============================================================================

//! ## Overview
//! Key layout for repository `R` and subtype `S`:
//! - payloads: `R` for the default subtype, `R:subtype:S` otherwise;
//! - companions: `<payload key>:time`, `<payload key>:branch`,
//!   `<payload key>:summary` (JSON);
//! - `R:subtypes` records every non-default subtype for [`ReferenceStore::dump`].
//!
//! The payload hash is written first with `HSETNX`; companions are only
//! written by the winner, so a lost race leaves the stored record intact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::MutexGuard;

use ccguard_core::BranchName;
use ccguard_core::CommitId;
use ccguard_core::CommitQuery;
use ccguard_core::CoverageSummary;
use ccguard_core::DumpedReference;
use ccguard_core::NewReference;
use ccguard_core::PersistOutcome;
use ccguard_core::ReferenceStore;
use ccguard_core::RepositoryId;
use ccguard_core::StoreError;
use ccguard_core::Subtype;
use ccguard_core::summarize_payload;
use ccguard_core::validate_new_reference;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::connection::HashConnection;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Default Redis port.
const DEFAULT_PORT: u16 = 6379;
/// Default connect and command timeout (ms).
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Connection settings for the Redis backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RedisStoreConfig {
    /// Server host name.
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Logical database index.
    #[serde(default)]
    pub db: i64,
    /// Optional `AUTH` password.
    #[serde(default)]
    pub password: Option<String>,
    /// Connect and command timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_PORT,
            db: 0,
            password: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Returns the default host.
fn default_host() -> String {
    "localhost".to_string()
}

/// Returns the default port.
const fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Returns the default timeout.
const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Redis store errors.
#[derive(Debug, Error)]
pub enum RedisStoreError {
    /// Server unreachable or connection dropped.
    #[error("redis connection error: {0}")]
    Connection(String),
    /// Command rejected by the server.
    #[error("redis command error: {0}")]
    Command(String),
    /// Stored companion data could not be decoded.
    #[error("redis store corruption: {0}")]
    Corrupt(String),
}

impl From<RedisStoreError> for StoreError {
    fn from(error: RedisStoreError) -> Self {
        match error {
            RedisStoreError::Connection(message) => Self::Unavailable(message),
            RedisStoreError::Command(message) => Self::Store(message),
            RedisStoreError::Corrupt(message) => Self::Corrupt(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Redis-backed reference store for one repository.
pub struct RedisReferenceStore<C> {
    /// Repository partition served by this store.
    repository: RepositoryId,
    /// Hash connection guarded by a mutex.
    connection: Mutex<C>,
}

impl<C: HashConnection> RedisReferenceStore<C> {
    /// Wraps an established connection.
    #[must_use]
    pub const fn new(repository: RepositoryId, connection: C) -> Self {
        Self {
            repository,
            connection: Mutex::new(connection),
        }
    }

    /// Returns the repository partition served by this store.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryId {
        &self.repository
    }

    /// Releases the store and returns the connection.
    ///
    /// # Errors
    ///
    /// Returns [`RedisStoreError::Connection`] when the mutex was poisoned.
    pub fn into_connection(self) -> Result<C, RedisStoreError> {
        self.connection
            .into_inner()
            .map_err(|_| RedisStoreError::Connection("connection mutex poisoned".to_string()))
    }

    /// Locks the connection.
    fn lock(&self) -> Result<MutexGuard<'_, C>, RedisStoreError> {
        self.connection
            .lock()
            .map_err(|_| RedisStoreError::Connection("connection mutex poisoned".to_string()))
    }

    /// Returns the payload hash key for a subtype.
    fn data_key(&self, subtype: &Subtype) -> String {
        if subtype.is_default() {
            self.repository.as_str().to_string()
        } else {
            format!("{}:subtype:{}", self.repository, subtype)
        }
    }

    /// Returns the key of the subtype registry.
    fn subtypes_key(&self) -> String {
        format!("{}:subtypes", self.repository)
    }

    /// Returns every subtype with at least one record.
    fn subtypes(&self, connection: &mut C) -> Result<Vec<Subtype>, RedisStoreError> {
        let mut subtypes = vec![Subtype::default()];
        subtypes.extend(connection.hkeys(&self.subtypes_key())?.into_iter().map(Subtype::new));
        Ok(subtypes)
    }

    /// Inserts the payload and, on success, its companion fields.
    fn persist_inner(&self, reference: &NewReference) -> Result<PersistOutcome, RedisStoreError> {
        let key = self.data_key(&reference.subtype);
        let commit = reference.commit_id.as_str();
        let mut connection = self.lock()?;
        if !connection.hset_nx(&key, commit, &reference.payload)? {
            debug!(commit, subtype = %reference.subtype, "reference already stored");
            return Ok(PersistOutcome::AlreadyExists);
        }
        let collected_at = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        connection.hset(&format!("{key}:time"), commit, collected_at.as_bytes())?;
        if let Some(branch) = &reference.branch {
            connection.hset(&format!("{key}:branch"), commit, branch.as_str().as_bytes())?;
        }
        let summary = summarize_payload(&reference.payload);
        let encoded = serde_json::to_vec(&summary)
            .map_err(|err| RedisStoreError::Corrupt(err.to_string()))?;
        connection.hset(&format!("{key}:summary"), commit, &encoded)?;
        if !reference.subtype.is_default() {
            connection.hset(&self.subtypes_key(), reference.subtype.as_str(), b"1")?;
        }
        drop(connection);
        info!(commit, subtype = %reference.subtype, "reference stored");
        Ok(PersistOutcome::Stored)
    }

    /// Lists commits of one subtype, or of every subtype when none is given.
    fn list_commits_inner(&self, query: &CommitQuery) -> Result<Vec<CommitId>, RedisStoreError> {
        if query.branch.is_some() || query.limit.is_some() {
            debug!("redis backend ignores branch and limit filters");
        }
        let mut connection = self.lock()?;
        let subtypes = match &query.subtype {
            Some(subtype) => vec![subtype.clone()],
            None => self.subtypes(&mut connection)?,
        };
        let mut seen: BTreeSet<CommitId> = BTreeSet::new();
        let mut commits: Vec<CommitId> = Vec::new();
        for subtype in subtypes {
            for commit in connection.hkeys(&self.data_key(&subtype))? {
                let commit = CommitId::new(commit);
                if seen.insert(commit.clone()) {
                    commits.push(commit);
                }
            }
        }
        drop(connection);
        Ok(commits)
    }

    /// Scans every subtype hash with its branch companion.
    fn dump_inner(&self) -> Result<Vec<DumpedReference>, RedisStoreError> {
        let mut connection = self.lock()?;
        let mut dumped = Vec::new();
        for subtype in self.subtypes(&mut connection)? {
            let key = self.data_key(&subtype);
            let branches = connection.hgetall(&format!("{key}:branch"))?;
            for (commit, payload) in connection.hgetall(&key)? {
                let branch = branches
                    .get(&commit)
                    .and_then(|raw| std::str::from_utf8(raw).ok())
                    .map(BranchName::new);
                dumped.push(DumpedReference {
                    commit_id: CommitId::new(commit),
                    subtype: subtype.clone(),
                    branch,
                    payload,
                });
            }
        }
        drop(connection);
        Ok(dumped)
    }

    /// Reads the JSON summary written at persist time.
    fn summary_inner(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<CoverageSummary>, RedisStoreError> {
        let key = format!("{}:summary", self.data_key(subtype));
        let raw = self.lock()?.hget(&key, commit_id.as_str())?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_slice(&raw) {
            Ok(summary) => Ok(Some(summary)),
            Err(err) => {
                warn!(commit = %commit_id, error = %err, "stored summary is not valid JSON");
                Err(RedisStoreError::Corrupt(format!("summary for commit {commit_id}: {err}")))
            }
        }
    }
}

impl<C: HashConnection> ReferenceStore for RedisReferenceStore<C> {
    fn list_commits(&self, query: &CommitQuery) -> Result<Vec<CommitId>, StoreError> {
        self.list_commits_inner(query).map_err(StoreError::from)
    }

    fn retrieve(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let key = self.data_key(subtype);
        let payload = self.lock()?.hget(&key, commit_id.as_str())?;
        Ok(payload)
    }

    fn persist(&self, reference: &NewReference) -> Result<PersistOutcome, StoreError> {
        validate_new_reference(reference)?;
        self.persist_inner(reference).map_err(StoreError::from)
    }

    fn dump(&self) -> Result<Vec<DumpedReference>, StoreError> {
        self.dump_inner().map_err(StoreError::from)
    }

    fn summary(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<CoverageSummary>, StoreError> {
        self.summary_inner(commit_id, subtype).map_err(StoreError::from)
    }
}
