// crates/ccguard-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Reference Store
// Description: Durable ReferenceStore backed by SQLite.
// Purpose: Persist coverage references per repository with integrity checks.
// Dependencies: ccguard-core, rusqlite, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! Each repository identity owns one table keyed by `(commit_id, type)`.
//! Rows carry the payload, its SHA-256 digest, the branch, the collection
//! time, a use counter, and the summary extracted at persist time. A row
//! whose `lts` flag is set holds a path into long-term storage instead of the
//! payload; reads follow the path and verify the digest either way.
//!
//! Inserts use `INSERT OR IGNORE`, so concurrent writers of the same key
//! converge on the first payload and the loser observes
//! [`PersistOutcome::AlreadyExists`].

// ============================================================================//
// SECTION: Imports
// ============================================================================//

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

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
use ccguard_core::hashing::payload_digest;
use ccguard_core::summarize_payload;
use ccguard_core::validate_new_reference;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

// ============================================================================//
// SECTION: Constants
// ============================================================================//

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// File name of an offloaded payload.
const LTS_FILE_NAME: &str = "coverage.xml";

// ============================================================================//
// SECTION: Config
// ============================================================================//

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` reference store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Root directory for offloaded payloads; offload is disabled when unset.
    #[serde(default)]
    pub lts_dir: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default pragmas and no offload.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lts_dir: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================//
// SECTION: Errors
// ============================================================================//

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or digest mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid request or configuration.
    #[error("sqlite store invalid request: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Store(message)
            }
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::Invalid(message) => Self::InvalidArgument(message),
        }
    }
}

// ============================================================================//
// SECTION: Store
// ============================================================================//

/// Inline record eligible for long-term offload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffloadCandidate {
    /// Commit identifier.
    pub commit_id: CommitId,
    /// Measurement subtype.
    pub subtype: Subtype,
    /// Number of times the record was read (starts at 1).
    pub use_count: u64,
}

/// Raw row fields needed to materialize a payload.
struct PayloadRow {
    /// True when `data` holds a long-term-storage path.
    lts: bool,
    /// Inline payload or UTF-8 path.
    data: Vec<u8>,
    /// Digest recorded at persist time.
    digest: String,
}

/// `SQLite`-backed reference store for one repository.
#[derive(Clone)]
pub struct SqliteReferenceStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Repository partition served by this store.
    repository: RepositoryId,
    /// Quoted table name for the repository.
    table: String,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteReferenceStore {
    /// Opens the store and creates the repository table when missing.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(
        config: SqliteStoreConfig,
        repository: RepositoryId,
    ) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        let table = table_name(&repository);
        create_repository_table(&connection, &table)?;
        debug!(repository = %repository, path = %config.path.display(), "sqlite store opened");
        Ok(Self {
            config,
            repository,
            table,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the repository partition served by this store.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryId {
        &self.repository
    }

    /// Returns the read counter of a record, or `None` when unknown.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn use_count(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<u64>, SqliteStoreError> {
        let guard = self.lock()?;
        let count: Option<i64> = guard
            .query_row(
                &format!("SELECT use_count FROM {} WHERE commit_id = ?1 AND type = ?2", self.table),
                params![commit_id.as_str(), subtype.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        count.map(|value| to_u64(value, "use_count")).transpose()
    }

    /// Lists inline records sharing the minimum use count, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn offload_candidates(&self) -> Result<Vec<OffloadCandidate>, SqliteStoreError> {
        let guard = self.lock()?;
        let sql = format!(
            "SELECT commit_id, type, use_count FROM {table} WHERE lts = 0 AND use_count = (SELECT \
             MIN(use_count) FROM {table} WHERE lts = 0) ORDER BY collected_at, rowid",
            table = self.table
        );
        let mut stmt = guard.prepare(&sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut candidates = Vec::new();
        for row in rows {
            let (commit_id, subtype, use_count) =
                row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            candidates.push(OffloadCandidate {
                commit_id: CommitId::new(commit_id),
                subtype: Subtype::new(subtype),
                use_count: to_u64(use_count, "use_count")?,
            });
        }
        Ok(candidates)
    }

    /// Moves a payload to long-term storage and leaves a redirect in place.
    ///
    /// Returns the path of the offloaded file. Offloading an already
    /// offloaded record returns its existing path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when no `lts_dir` is configured
    /// or the record is unknown, and another [`SqliteStoreError`] when the
    /// file cannot be written or the row cannot be updated.
    pub fn offload(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<PathBuf, SqliteStoreError> {
        let Some(lts_dir) = self.config.lts_dir.as_ref() else {
            return Err(SqliteStoreError::Invalid("lts_dir is not configured".to_string()));
        };
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let row = select_payload_row(&tx, &self.table, commit_id, subtype)?;
        let Some(row) = row else {
            return Err(SqliteStoreError::Invalid(format!(
                "no reference for commit {commit_id} ({subtype})"
            )));
        };
        if row.lts {
            return lts_path(&row.data);
        }
        let directory = lts_dir
            .join(self.repository.as_str())
            .join(commit_id.as_str())
            .join(subtype.as_str());
        let path = directory.join(LTS_FILE_NAME);
        let Some(pointer) = path.to_str().map(|text| text.as_bytes().to_vec()) else {
            return Err(SqliteStoreError::Invalid(format!(
                "long-term path is not valid UTF-8: {}",
                path.display()
            )));
        };
        std::fs::create_dir_all(&directory).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        std::fs::write(&path, &row.data).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let updated = tx
            .execute(
                &format!(
                    "UPDATE {} SET lts = 1, data = ?1 WHERE commit_id = ?2 AND type = ?3",
                    self.table
                ),
                params![pointer, commit_id.as_str(), subtype.as_str()],
            )
            .and_then(|_| tx.commit());
        if let Err(err) = updated {
            if let Err(cleanup) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %cleanup, "stale long-term file left behind");
            }
            return Err(SqliteStoreError::Db(err.to_string()));
        }
        drop(guard);
        info!(commit = %commit_id, subtype = %subtype, path = %path.display(), "payload offloaded");
        Ok(path)
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Lists commits matching the query, newest first.
    fn list_commits_inner(&self, query: &CommitQuery) -> Result<Vec<CommitId>, SqliteStoreError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(subtype) = &query.subtype {
            clauses.push("type = ?");
            values.push(Value::Text(subtype.as_str().to_string()));
        }
        if let Some(branch) = &query.branch {
            clauses.push("branch = ?");
            values.push(Value::Text(branch.as_str().to_string()));
        }
        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let limit = match query.limit {
            Some(limit) => i64::try_from(limit)
                .map_err(|_| SqliteStoreError::Invalid("listing limit too large".to_string()))?,
            None => -1,
        };
        values.push(Value::Integer(limit));
        let sql = format!(
            "SELECT commit_id, MAX(collected_at) AS latest, MAX(rowid) AS seq FROM {}{filter} \
             GROUP BY commit_id ORDER BY latest DESC, seq DESC LIMIT ?",
            self.table
        );
        let guard = self.lock()?;
        let mut stmt = guard.prepare(&sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| row.get::<_, String>(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut commits = Vec::new();
        for row in rows {
            commits.push(CommitId::new(row.map_err(|err| SqliteStoreError::Db(err.to_string()))?));
        }
        Ok(commits)
    }

    /// Loads a payload and bumps its use counter.
    fn retrieve_inner(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<Vec<u8>>, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some(row) = select_payload_row(&tx, &self.table, commit_id, subtype)? else {
            return Ok(None);
        };
        let payload = materialize(row, commit_id)?;
        tx.execute(
            &format!(
                "UPDATE {} SET use_count = use_count + 1 WHERE commit_id = ?1 AND type = ?2",
                self.table
            ),
            params![commit_id.as_str(), subtype.as_str()],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(Some(payload))
    }

    /// Inserts a reference unless its key already exists.
    fn persist_inner(&self, reference: &NewReference) -> Result<PersistOutcome, SqliteStoreError> {
        let summary = summarize_payload(&reference.payload);
        let digest = payload_digest(&reference.payload);
        let lines_covered = i64::try_from(summary.lines_covered)
            .map_err(|_| SqliteStoreError::Invalid("lines_covered out of range".to_string()))?;
        let lines_valid = i64::try_from(summary.lines_valid)
            .map_err(|_| SqliteStoreError::Invalid("lines_valid out of range".to_string()))?;
        let guard = self.lock()?;
        let inserted = guard
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO {} (commit_id, type, branch, collected_at, use_count, \
                     lts, data, digest, line_rate, lines_covered, lines_valid) VALUES (?1, ?2, ?3, \
                     ?4, 1, 0, ?5, ?6, ?7, ?8, ?9)",
                    self.table
                ),
                params![
                    reference.commit_id.as_str(),
                    reference.subtype.as_str(),
                    reference.branch.as_ref().map(BranchName::as_str),
                    unix_millis(),
                    reference.payload,
                    digest,
                    summary.line_rate,
                    lines_covered,
                    lines_valid
                ],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        if inserted == 0 {
            debug!(
                commit = %reference.commit_id,
                subtype = %reference.subtype,
                "reference already stored"
            );
            return Ok(PersistOutcome::AlreadyExists);
        }
        info!(
            commit = %reference.commit_id,
            subtype = %reference.subtype,
            line_rate = summary.line_rate,
            "reference stored"
        );
        Ok(PersistOutcome::Stored)
    }

    /// Reads every record, resolving long-term pointers.
    fn dump_inner(&self) -> Result<Vec<DumpedReference>, SqliteStoreError> {
        let raw = {
            let guard = self.lock()?;
            let sql = format!(
                "SELECT commit_id, type, branch, lts, data, digest FROM {} ORDER BY collected_at, \
                 rowid",
                self.table
            );
            let mut stmt =
                guard.prepare(&sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rows = stmt
                .query_map(params![], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        PayloadRow {
                            lts: row.get::<_, i64>(3)? != 0,
                            data: row.get(4)?,
                            digest: row.get(5)?,
                        },
                    ))
                })
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let mut raw = Vec::new();
            for row in rows {
                raw.push(row.map_err(|err| SqliteStoreError::Db(err.to_string()))?);
            }
            raw
        };
        let mut dumped = Vec::with_capacity(raw.len());
        for (commit_id, subtype, branch, row) in raw {
            let commit_id = CommitId::new(commit_id);
            let payload = materialize(row, &commit_id)?;
            dumped.push(DumpedReference {
                commit_id,
                subtype: Subtype::new(subtype),
                branch: branch.map(BranchName::new),
                payload,
            });
        }
        Ok(dumped)
    }

    /// Reads the summary recorded at persist time.
    fn summary_inner(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<CoverageSummary>, SqliteStoreError> {
        let guard = self.lock()?;
        let row: Option<(f64, i64, i64)> = guard
            .query_row(
                &format!(
                    "SELECT line_rate, lines_covered, lines_valid FROM {} WHERE commit_id = ?1 \
                     AND type = ?2",
                    self.table
                ),
                params![commit_id.as_str(), subtype.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        let Some((line_rate, lines_covered, lines_valid)) = row else {
            return Ok(None);
        };
        Ok(Some(CoverageSummary {
            line_rate,
            lines_covered: to_u64(lines_covered, "lines_covered")?,
            lines_valid: to_u64(lines_valid, "lines_valid")?,
        }))
    }
}

impl ReferenceStore for SqliteReferenceStore {
    fn list_commits(&self, query: &CommitQuery) -> Result<Vec<CommitId>, StoreError> {
        self.list_commits_inner(query).map_err(StoreError::from)
    }

    fn retrieve(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        self.retrieve_inner(commit_id, subtype).map_err(StoreError::from)
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

// ============================================================================//
// SECTION: Helpers
// ============================================================================//

/// Returns the quoted table name for a repository.
fn table_name(repository: &RepositoryId) -> String {
    format!("\"timestamped_coverage_{}_v1\"", repository.as_str())
}

/// Reads the payload columns of one record.
fn select_payload_row(
    connection: &Connection,
    table: &str,
    commit_id: &CommitId,
    subtype: &Subtype,
) -> Result<Option<PayloadRow>, SqliteStoreError> {
    connection
        .query_row(
            &format!("SELECT lts, data, digest FROM {table} WHERE commit_id = ?1 AND type = ?2"),
            params![commit_id.as_str(), subtype.as_str()],
            |row| {
                Ok(PayloadRow {
                    lts: row.get::<_, i64>(0)? != 0,
                    data: row.get(1)?,
                    digest: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))
}

/// Resolves a row to payload bytes and verifies the digest.
fn materialize(row: PayloadRow, commit_id: &CommitId) -> Result<Vec<u8>, SqliteStoreError> {
    let payload = if row.lts {
        let path = lts_path(&row.data)?;
        std::fs::read(&path).map_err(|err| {
            SqliteStoreError::Io(format!("long-term payload {}: {err}", path.display()))
        })?
    } else {
        row.data
    };
    if payload_digest(&payload) != row.digest {
        return Err(SqliteStoreError::Corrupt(format!("digest mismatch for commit {commit_id}")));
    }
    Ok(payload)
}

/// Decodes a long-term-storage pointer.
fn lts_path(data: &[u8]) -> Result<PathBuf, SqliteStoreError> {
    std::str::from_utf8(data)
        .map(PathBuf::from)
        .map_err(|_| SqliteStoreError::Corrupt("long-term pointer is not valid UTF-8".to_string()))
}

/// Converts a stored integer to `u64`.
fn to_u64(value: i64, column: &str) -> Result<u64, SqliteStoreError> {
    u64::try_from(value).map_err(|_| SqliteStoreError::Corrupt(format!("negative {column}")))
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the metadata table or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Creates the per-repository table.
fn create_repository_table(connection: &Connection, table: &str) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                commit_id TEXT NOT NULL,
                type TEXT NOT NULL,
                branch TEXT,
                collected_at INTEGER NOT NULL,
                use_count INTEGER NOT NULL DEFAULT 1,
                lts INTEGER NOT NULL DEFAULT 0,
                data BLOB NOT NULL,
                digest TEXT NOT NULL,
                line_rate REAL NOT NULL DEFAULT 0,
                lines_covered INTEGER NOT NULL DEFAULT 0,
                lines_valid INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (commit_id, type)
            );"
        ))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
