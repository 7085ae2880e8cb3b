// crates/ccguard-cli/src/backend.rs
// ============================================================================
// Module: CLI Workspace and Store Factory
// Description: Repository discovery, config resolution, and backend opening.
// Purpose: Resolve everything a command needs once, at startup.
// Dependencies: ccguard-config, ccguard-core, ccguard-git, ccguard store crates
// ============================================================================

//! ## Overview
//! A [`Workspace`] binds the discovered git repository, the layered
//! configuration, and the repository identity. Stores are opened through
//! [`open_store`], which maps a [`BackendKind`] to a boxed
//! [`ReferenceStore`]; the store is dropped, releasing its connection, when
//! the command returns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use ccguard_config::BackendKind;
use ccguard_config::CcguardConfig;
use ccguard_config::ConfigEnvironment;
use ccguard_config::resolve_backend;
use ccguard_core::ReferenceStore;
use ccguard_core::RepositoryId;
use ccguard_core::VersionControl;
use ccguard_git::GitRepository;
use ccguard_store_http::HttpReferenceStore;
use ccguard_store_redis::RedisConnection;
use ccguard_store_redis::RedisReferenceStore;
use ccguard_store_sqlite::SqliteReferenceStore;
use tracing::debug;

use crate::CliError;
use crate::CliResult;

// ============================================================================
// SECTION: Workspace
// ============================================================================

/// Repository, configuration, and identity shared by every command.
pub(crate) struct Workspace {
    /// Discovered git repository.
    pub(crate) git: GitRepository,
    /// Resolved configuration.
    pub(crate) config: CcguardConfig,
    /// Partition key for stored references.
    pub(crate) repository_id: RepositoryId,
}

impl Workspace {
    /// Discovers the repository at `repository` and loads its configuration.
    pub(crate) fn open(repository: &Path, config_path: Option<&Path>) -> CliResult<Self> {
        let git = GitRepository::discover(repository)
            .map_err(|err| CliError::new(format!("cannot open repository: {err}")))?;
        let root = git.root_path().ok();
        let config =
            CcguardConfig::load(config_path, root.as_deref(), &ConfigEnvironment::from_process())
                .map_err(|err| CliError::new(format!("cannot load configuration: {err}")))?;
        let root_commit = git
            .repository_root_commit()
            .map_err(|err| CliError::new(format!("cannot determine repository id: {err}")))?;
        let repository_id =
            RepositoryId::from_root_commit(&root_commit, config.repository.suffix.as_deref())
                .map_err(|err| CliError::new(format!("invalid repository id: {err}")))?;
        debug!(repository = %repository_id, "workspace opened");
        Ok(Self {
            git,
            config,
            repository_id,
        })
    }

    /// Opens the backend named by `flag`, else the configured adapter.
    pub(crate) fn open_store(&self, flag: Option<&str>) -> CliResult<Box<dyn ReferenceStore>> {
        let kind =
            resolve_backend(flag, &self.config).map_err(|err| CliError::new(err.to_string()))?;
        open_store(kind, &self.config, &self.repository_id)
    }

    /// Opens the embedded backend with its concrete type.
    pub(crate) fn open_sqlite(&self) -> CliResult<SqliteReferenceStore> {
        SqliteReferenceStore::open(self.config.sqlite.store_config(), self.repository_id.clone())
            .map_err(|err| CliError::new(format!("cannot open sqlite store: {err}")))
    }
}

// ============================================================================
// SECTION: Store Factory
// ============================================================================

/// Opens the reference store for `kind`.
pub(crate) fn open_store(
    kind: BackendKind,
    config: &CcguardConfig,
    repository: &RepositoryId,
) -> CliResult<Box<dyn ReferenceStore>> {
    debug!(backend = %kind, repository = %repository, "opening reference store");
    let store: Box<dyn ReferenceStore> = match kind {
        BackendKind::Sqlite => Box::new(
            SqliteReferenceStore::open(config.sqlite.store_config(), repository.clone())
                .map_err(|err| CliError::new(format!("cannot open sqlite store: {err}")))?,
        ),
        BackendKind::Redis => {
            let connection = RedisConnection::connect(&config.redis.store_config())
                .map_err(|err| CliError::new(format!("cannot connect to redis: {err}")))?;
            Box::new(RedisReferenceStore::new(repository.clone(), connection))
        }
        BackendKind::Web => {
            let web = config.web.store_config().map_err(|err| CliError::new(err.to_string()))?;
            Box::new(
                HttpReferenceStore::new(web, repository.clone())
                    .map_err(|err| CliError::new(format!("cannot open web store: {err}")))?,
            )
        }
    };
    Ok(store)
}
