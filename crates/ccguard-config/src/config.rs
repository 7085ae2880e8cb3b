// crates/ccguard-config/src/config.rs
// ============================================================================
// Module: ccguard Configuration
// Description: Configuration loading, layering, and validation for ccguard.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: ccguard-core, ccguard store crates, serde, toml
// ============================================================================

//! ## Overview
//! Configuration layers are merged table by table, later layers winning:
//! built-in defaults, `~/.ccguard.toml`, then `<repository>/.ccguard.toml`.
//! An explicit path (flag or `CCGUARD_CONFIG`) replaces both discovered
//! files. `CCGUARD_SERVER_ADDRESS` and `CCGUARD_TOKEN` override the remote
//! backend settings last.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use ccguard_core::RegressionThresholds;
use ccguard_store_http::HttpStoreConfig;
use ccguard_store_redis::RedisStoreConfig;
use ccguard_store_sqlite::SqliteJournalMode;
use ccguard_store_sqlite::SqliteStoreConfig;
use ccguard_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;
use toml::Table;
use toml::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Configuration file name, in the home directory and the repository root.
pub const CONFIG_FILE_NAME: &str = ".ccguard.toml";
/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "CCGUARD_CONFIG";
/// Environment variable overriding `web.server_address`.
pub const SERVER_ADDRESS_ENV_VAR: &str = "CCGUARD_SERVER_ADDRESS";
/// Environment variable overriding `web.token`.
pub const TOKEN_ENV_VAR: &str = "CCGUARD_TOKEN";
/// Default database file name, placed in the home directory.
const DB_FILE_NAME: &str = ".ccguard.db";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default target branch for merge-base computation.
const DEFAULT_TARGET_BRANCH: &str = "master";
/// Default HTTP request timeout in milliseconds.
const DEFAULT_WEB_TIMEOUT_MS: u64 = 30_000;
/// Default `SQLite` busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Backend Selection
// ============================================================================

/// Reference store backends selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded `SQLite` database.
    Sqlite,
    /// Redis hashes.
    Redis,
    /// Remote ccguard server over HTTP.
    Web,
}

impl BackendKind {
    /// Parses a backend identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unknown identifiers.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim() {
            "sqlite" => Ok(Self::Sqlite),
            "redis" => Ok(Self::Redis),
            "web" => Ok(Self::Web),
            other => Err(ConfigError::Invalid(format!(
                "unknown adapter {other:?} (expected sqlite, redis, or web)"
            ))),
        }
    }

    /// Returns the identifier used in configuration and flags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Redis => "redis",
            Self::Web => "web",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks the backend: an explicit flag wins over the configured `adapter`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the chosen identifier is unknown.
pub fn resolve_backend(
    flag: Option<&str>,
    config: &CcguardConfig,
) -> Result<BackendKind, ConfigError> {
    BackendKind::parse(flag.unwrap_or(&config.adapter))
}

// ============================================================================
// SECTION: Environment
// ============================================================================

/// Process inputs consulted while loading configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigEnvironment {
    /// Home directory holding the user config and default database.
    pub home: Option<PathBuf>,
    /// Value of `CCGUARD_CONFIG`.
    pub config_path: Option<PathBuf>,
    /// Value of `CCGUARD_SERVER_ADDRESS`.
    pub server_address: Option<String>,
    /// Value of `CCGUARD_TOKEN`.
    pub token: Option<String>,
}

impl ConfigEnvironment {
    /// Captures the current process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self {
            home: env::var_os("HOME").filter(|value| !value.is_empty()).map(PathBuf::from),
            config_path: env::var_os(CONFIG_ENV_VAR)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            server_address: non_empty_var(SERVER_ADDRESS_ENV_VAR),
            token: non_empty_var(TOKEN_ENV_VAR),
        }
    }
}

// ============================================================================
// SECTION: Configuration Model
// ============================================================================

/// Top-level ccguard configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CcguardConfig {
    /// Default backend identifier.
    #[serde(default = "default_adapter")]
    pub adapter: String,
    /// Embedded backend settings.
    #[serde(default)]
    pub sqlite: SqliteSection,
    /// Redis backend settings.
    #[serde(default)]
    pub redis: RedisSection,
    /// Remote backend settings.
    #[serde(default)]
    pub web: WebSection,
    /// Regression policy settings.
    #[serde(default)]
    pub policy: PolicySection,
    /// Repository identity settings.
    #[serde(default)]
    pub repository: RepositorySection,
}

impl Default for CcguardConfig {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
            sqlite: SqliteSection::default(),
            redis: RedisSection::default(),
            web: WebSection::default(),
            policy: PolicySection::default(),
            repository: RepositorySection::default(),
        }
    }
}

impl CcguardConfig {
    /// Loads and validates configuration using the layering rules.
    ///
    /// `repository_root` locates the repository config file; an explicit
    /// `path` (or `CCGUARD_CONFIG`) replaces the discovered files and must
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a layer cannot be read or parsed, or when
    /// the merged configuration is invalid.
    pub fn load(
        path: Option<&Path>,
        repository_root: Option<&Path>,
        environment: &ConfigEnvironment,
    ) -> Result<Self, ConfigError> {
        let explicit = path.map(Path::to_path_buf).or_else(|| environment.config_path.clone());
        let mut merged = Table::new();
        if let Some(explicit) = explicit {
            merge_tables(&mut merged, read_layer(&explicit)?);
        } else {
            let discovered = [
                environment.home.as_ref().map(|home| home.join(CONFIG_FILE_NAME)),
                repository_root.map(|root| root.join(CONFIG_FILE_NAME)),
            ];
            for candidate in discovered.into_iter().flatten() {
                if candidate.is_file() {
                    merge_tables(&mut merged, read_layer(&candidate)?);
                }
            }
        }
        let mut config = Self::from_table(merged)?;
        config.apply_environment(environment);
        config.validate()?;
        Ok(config)
    }

    /// Parses a single TOML document without layering or validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: Table =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        Self::from_table(table)
    }

    /// Deserializes a merged table.
    fn from_table(table: Table) -> Result<Self, ConfigError> {
        Value::Table(table)
            .try_into()
            .map_err(|err: toml::de::Error| ConfigError::Parse(err.to_string()))
    }

    /// Applies environment overrides and the home-relative database default.
    pub fn apply_environment(&mut self, environment: &ConfigEnvironment) {
        if let Some(address) = &environment.server_address {
            self.web.server_address = Some(address.clone());
        }
        if let Some(token) = &environment.token {
            self.web.token = Some(token.clone());
        }
        if self.sqlite.path.is_none() {
            self.sqlite.path = Some(
                environment
                    .home
                    .as_ref()
                    .map_or_else(|| PathBuf::from(DB_FILE_NAME), |home| home.join(DB_FILE_NAME)),
            );
        }
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when any section is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        BackendKind::parse(&self.adapter)?;
        self.sqlite.validate()?;
        self.redis.validate()?;
        self.web.validate()?;
        self.policy.thresholds()?;
        self.repository.validate()?;
        Ok(())
    }
}

/// Embedded backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteSection {
    /// Database path; defaults to `~/.ccguard.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Long-term storage root for offloaded payloads.
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

impl Default for SqliteSection {
    fn default() -> Self {
        Self {
            path: None,
            lts_dir: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl SqliteSection {
    /// Builds the store configuration.
    #[must_use]
    pub fn store_config(&self) -> SqliteStoreConfig {
        let path = self.path.clone().unwrap_or_else(|| PathBuf::from(DB_FILE_NAME));
        SqliteStoreConfig {
            lts_dir: self.lts_dir.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
            ..SqliteStoreConfig::new(path)
        }
    }

    /// Validates path limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("sqlite.path", &path.to_string_lossy())?;
        }
        if let Some(lts_dir) = &self.lts_dir {
            validate_path_string("sqlite.lts_dir", &lts_dir.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Redis backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisSection {
    /// Server host.
    #[serde(default = "default_redis_host")]
    pub host: String,
    /// Server port.
    #[serde(default = "default_redis_port")]
    pub port: u16,
    /// Logical database index.
    #[serde(default)]
    pub db: i64,
    /// Optional `AUTH` password.
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for RedisSection {
    fn default() -> Self {
        let defaults = RedisStoreConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            db: defaults.db,
            password: defaults.password,
        }
    }
}

impl RedisSection {
    /// Builds the store configuration.
    #[must_use]
    pub fn store_config(&self) -> RedisStoreConfig {
        RedisStoreConfig {
            host: self.host.clone(),
            port: self.port,
            db: self.db,
            password: self.password.clone(),
            ..RedisStoreConfig::default()
        }
    }

    /// Validates connection settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("redis.host must be non-empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("redis.port must be greater than zero".to_string()));
        }
        if self.db < 0 {
            return Err(ConfigError::Invalid("redis.db must be >= 0".to_string()));
        }
        Ok(())
    }
}

/// Remote backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebSection {
    /// Base address of the ccguard server.
    #[serde(default)]
    pub server_address: Option<String>,
    /// Bearer token for writes.
    #[serde(default)]
    pub token: Option<String>,
    /// Request timeout in milliseconds.
    #[serde(default = "default_web_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            server_address: None,
            token: None,
            timeout_ms: DEFAULT_WEB_TIMEOUT_MS,
        }
    }
}

impl WebSection {
    /// Builds the store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when no server address is configured.
    pub fn store_config(&self) -> Result<HttpStoreConfig, ConfigError> {
        let Some(address) = &self.server_address else {
            return Err(ConfigError::Invalid(format!(
                "web.server_address must be set (or {SERVER_ADDRESS_ENV_VAR})"
            )));
        };
        Ok(HttpStoreConfig {
            token: self.token.clone(),
            timeout_ms: self.timeout_ms,
            ..HttpStoreConfig::new(address.clone())
        })
    }

    /// Validates the server address scheme and timeout.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "web.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(address) = &self.server_address {
            let trimmed = address.trim();
            if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
                return Err(ConfigError::Invalid(
                    "web.server_address must include http:// or https://".to_string(),
                ));
            }
        }
        if self.token.as_deref().is_some_and(|token| token.trim().is_empty()) {
            return Err(ConfigError::Invalid("web.token must be non-empty when set".to_string()));
        }
        Ok(())
    }
}

/// Regression policy settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySection {
    /// Allowed per-file drop below the reference rate.
    #[serde(default)]
    pub tolerance: f64,
    /// Absolute per-file floor; negative disables it.
    #[serde(default = "default_hard_minimum")]
    pub hard_minimum: f64,
    /// Branch the change will be merged into.
    #[serde(default = "default_target_branch")]
    pub target_branch: String,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            tolerance: 0.0,
            hard_minimum: default_hard_minimum(),
            target_branch: default_target_branch(),
        }
    }
}

impl PolicySection {
    /// Returns validated thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range values.
    pub fn thresholds(&self) -> Result<RegressionThresholds, ConfigError> {
        if self.target_branch.trim().is_empty() {
            return Err(ConfigError::Invalid("policy.target_branch must be non-empty".to_string()));
        }
        RegressionThresholds::new(self.tolerance, self.hard_minimum)
            .map_err(|err| ConfigError::Invalid(format!("policy: {err}")))
    }
}

/// Repository identity settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositorySection {
    /// Token appended to the root commit to form the repository id.
    #[serde(default)]
    pub suffix: Option<String>,
}

impl RepositorySection {
    /// Validates the suffix alphabet.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(suffix) = &self.suffix
            && !suffix.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(ConfigError::Invalid(
                "repository.suffix must contain only ASCII alphanumerics and '_'".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads one config layer with size, encoding, and path guards.
fn read_layer(path: &Path) -> Result<Table, ConfigError> {
    validate_path(path)?;
    let bytes =
        fs::read(path).map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    let content = std::str::from_utf8(&bytes)
        .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
    toml::from_str(content)
        .map_err(|err| ConfigError::Parse(format!("{}: {err}", path.display())))
}

/// Merges `overlay` into `base`; nested tables merge key by key.
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        if let Value::Table(incoming) = value {
            if let Some(Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
            } else {
                base.insert(key, Value::Table(incoming));
            }
        } else {
            base.insert(key, value);
        }
    }
}

/// Validates a config path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Returns a non-empty environment variable.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Default backend identifier.
fn default_adapter() -> String {
    BackendKind::Sqlite.as_str().to_string()
}

/// Default `SQLite` busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default Redis host.
fn default_redis_host() -> String {
    RedisStoreConfig::default().host
}

/// Default Redis port.
fn default_redis_port() -> u16 {
    RedisStoreConfig::default().port
}

/// Default HTTP timeout.
const fn default_web_timeout_ms() -> u64 {
    DEFAULT_WEB_TIMEOUT_MS
}

/// Default hard minimum (disabled).
const fn default_hard_minimum() -> f64 {
    -1.0
}

/// Default target branch.
fn default_target_branch() -> String {
    DEFAULT_TARGET_BRANCH.to_string()
}
