// crates/ccguard-store-http/src/store.rs
// ============================================================================
// Module: HTTP Reference Store
// Description: ReferenceStore that delegates to a remote ccguard server.
// Purpose: Map the store contract onto a small REST protocol with bounded reads.
// Dependencies: ccguard-core, reqwest, base64, serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! Endpoints, relative to `{server}/api/v1/references/{repository}`:
//! - `GET all` lists commit IDs (JSON array), with optional `subtype`,
//!   `branch`, and `limit` query parameters;
//! - `GET {commit}/data` returns the raw payload, `404` when unknown;
//! - `PUT {commit}/data` stores a payload, `409` when it already exists;
//! - `GET {commit}/summary` returns the JSON summary;
//! - `GET data` dumps every record as JSON with base64 payloads.
//!
//! Response bodies are read up to a configured limit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
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
use ccguard_core::validate_new_reference;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default request timeout (ms).
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default response size limit (bytes).
const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;
/// User agent for outbound requests.
const USER_AGENT: &str = concat!("ccguard/", env!("CARGO_PKG_VERSION"));

/// Configuration for the HTTP backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpStoreConfig {
    /// Base address of the ccguard server.
    pub server_address: String,
    /// Bearer token required for writes.
    #[serde(default)]
    pub token: Option<String>,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl HttpStoreConfig {
    /// Creates a config for `server_address` with default limits and no token.
    #[must_use]
    pub fn new(server_address: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            token: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

/// Returns the default request timeout.
const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Returns the default response size limit.
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// HTTP store errors.
#[derive(Debug, Error)]
pub enum HttpStoreError {
    /// Invalid server address or client setup.
    #[error("http store config error: {0}")]
    Config(String),
    /// Write attempted without a bearer token.
    #[error("http store requires a token for writes")]
    MissingToken,
    /// Request could not be sent or the response could not be read.
    #[error("http store transport error: {0}")]
    Transport(String),
    /// Server answered with an unexpected status.
    #[error("http store unexpected status {status} for {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Request URL.
        url: String,
    },
    /// Response body exceeded the configured limit.
    #[error("http store response exceeds {0} bytes")]
    TooLarge(usize),
}

impl From<HttpStoreError> for StoreError {
    fn from(error: HttpStoreError) -> Self {
        match error {
            HttpStoreError::Config(message) => Self::InvalidArgument(message),
            HttpStoreError::MissingToken => Self::InvalidArgument(error.to_string()),
            HttpStoreError::Transport(message) => Self::Unavailable(message),
            HttpStoreError::Status {
                status, ..
            } if status >= 500 => Self::Unavailable(error.to_string()),
            HttpStoreError::Status {
                ..
            }
            | HttpStoreError::TooLarge(_) => Self::Store(error.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// One record of the dump endpoint.
#[derive(Debug, Deserialize)]
struct DumpRecord {
    /// Commit identifier.
    commit_id: String,
    /// Subtype, absent for the default subtype.
    #[serde(default)]
    subtype: Option<String>,
    /// Branch, when recorded.
    #[serde(default)]
    branch: Option<String>,
    /// Base64-encoded payload.
    data: String,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Reference store backed by a remote ccguard server.
pub struct HttpReferenceStore {
    /// Store configuration.
    config: HttpStoreConfig,
    /// Repository partition served by this store.
    repository: RepositoryId,
    /// Parsed server address.
    base: Url,
    /// Blocking HTTP client.
    client: Client,
}

impl HttpReferenceStore {
    /// Builds a client for the configured server.
    ///
    /// # Errors
    ///
    /// Returns [`HttpStoreError::Config`] for an invalid or non-HTTP server
    /// address, or when the client cannot be created.
    pub fn new(config: HttpStoreConfig, repository: RepositoryId) -> Result<Self, HttpStoreError> {
        let base = Url::parse(&config.server_address)
            .map_err(|err| HttpStoreError::Config(format!("invalid server address: {err}")))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(HttpStoreError::Config(format!(
                "server address must be an http(s) URL: {}",
                config.server_address
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .build()
            .map_err(|err| HttpStoreError::Config(format!("http client build failed: {err}")))?;
        Ok(Self {
            config,
            repository,
            base,
            client,
        })
    }

    /// Returns the repository partition served by this store.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryId {
        &self.repository
    }

    /// Builds an endpoint URL under the repository prefix.
    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, HttpStoreError> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                HttpStoreError::Config("server address cannot be a base URL".to_string())
            })?;
            path.pop_if_empty();
            path.extend(["api", "v1", "references", self.repository.as_str()]);
            path.extend(segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Sends a GET request.
    fn get(&self, url: Url) -> Result<Response, HttpStoreError> {
        debug!(%url, "GET");
        self.client.get(url).send().map_err(|err| HttpStoreError::Transport(err.to_string()))
    }

    /// Reads a response body within the configured limit.
    fn read_body(&self, response: &mut Response) -> Result<Vec<u8>, HttpStoreError> {
        read_response_limited(response, self.config.max_response_bytes)
    }

    /// Lists commits through the `all` endpoint.
    fn list_commits_inner(&self, query: &CommitQuery) -> Result<Vec<CommitId>, HttpStoreError> {
        let mut params = Vec::new();
        if let Some(subtype) = &query.subtype {
            params.push(("subtype", subtype.as_str().to_string()));
        }
        if let Some(branch) = &query.branch {
            params.push(("branch", branch.as_str().to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        let url = self.endpoint(&["all"], &params)?;
        let mut response = self.get(url.clone())?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        ensure_success(&response, &url)?;
        let body = self.read_body(&mut response)?;
        match serde_json::from_slice::<Vec<String>>(&body) {
            Ok(commits) => Ok(commits.into_iter().map(CommitId::new).collect()),
            Err(err) => {
                warn!(%url, error = %err, "malformed commit listing; treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Downloads one payload.
    fn retrieve_inner(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<Vec<u8>>, HttpStoreError> {
        let url = self.endpoint(&[commit_id.as_str(), "data"], &subtype_param(subtype))?;
        let mut response = self.get(url.clone())?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        ensure_success(&response, &url)?;
        Ok(Some(self.read_body(&mut response)?))
    }

    /// Uploads one payload with the bearer token.
    fn persist_inner(&self, reference: &NewReference) -> Result<PersistOutcome, HttpStoreError> {
        let Some(token) = self.config.token.as_deref() else {
            return Err(HttpStoreError::MissingToken);
        };
        let mut params = subtype_param(&reference.subtype);
        if let Some(branch) = &reference.branch {
            params.push(("branch", branch.as_str().to_string()));
        }
        let url = self.endpoint(&[reference.commit_id.as_str(), "data"], &params)?;
        debug!(%url, "PUT");
        let response = self
            .client
            .put(url.clone())
            .bearer_auth(token)
            .body(reference.payload.clone())
            .send()
            .map_err(|err| HttpStoreError::Transport(err.to_string()))?;
        if response.status() == StatusCode::CONFLICT {
            debug!(commit = %reference.commit_id, "reference already stored remotely");
            return Ok(PersistOutcome::AlreadyExists);
        }
        ensure_success(&response, &url)?;
        info!(commit = %reference.commit_id, subtype = %reference.subtype, "reference uploaded");
        Ok(PersistOutcome::Stored)
    }

    /// Downloads the full dump.
    fn dump_inner(&self) -> Result<Vec<DumpedReference>, HttpStoreError> {
        let url = self.endpoint(&["data"], &[])?;
        let mut response = self.get(url.clone())?;
        ensure_success(&response, &url)?;
        let body = self.read_body(&mut response)?;
        let records = match serde_json::from_slice::<Vec<DumpRecord>>(&body) {
            Ok(records) => records,
            Err(err) => {
                warn!(%url, error = %err, "malformed dump; treating as empty");
                return Ok(Vec::new());
            }
        };
        let mut dumped = Vec::with_capacity(records.len());
        for record in records {
            let Ok(payload) = STANDARD.decode(record.data.as_bytes()) else {
                warn!(commit = %record.commit_id, "dump record payload is not base64; skipped");
                continue;
            };
            dumped.push(DumpedReference {
                commit_id: CommitId::new(record.commit_id),
                subtype: Subtype::or_default(record.subtype.as_deref()),
                branch: record.branch.map(BranchName::new),
                payload,
            });
        }
        Ok(dumped)
    }

    /// Fetches the remote summary.
    fn summary_inner(
        &self,
        commit_id: &CommitId,
        subtype: &Subtype,
    ) -> Result<Option<CoverageSummary>, HttpStoreError> {
        let url = self.endpoint(&[commit_id.as_str(), "summary"], &subtype_param(subtype))?;
        let mut response = self.get(url.clone())?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        ensure_success(&response, &url)?;
        let body = self.read_body(&mut response)?;
        match serde_json::from_slice::<CoverageSummary>(&body) {
            Ok(summary) => Ok(Some(summary)),
            Err(err) => {
                warn!(%url, error = %err, "malformed summary; treating as absent");
                Ok(None)
            }
        }
    }
}

impl ReferenceStore for HttpReferenceStore {
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

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the `subtype` query parameter for non-default subtypes.
fn subtype_param(subtype: &Subtype) -> Vec<(&'static str, String)> {
    if subtype.is_default() {
        Vec::new()
    } else {
        vec![("subtype", subtype.as_str().to_string())]
    }
}

/// Fails on any non-success status.
fn ensure_success(response: &Response, url: &Url) -> Result<(), HttpStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(HttpStoreError::Status {
        status: status.as_u16(),
        url: url.to_string(),
    })
}

/// Reads a response body, enforcing a strict size limit.
fn read_response_limited(
    response: &mut Response,
    max_bytes: usize,
) -> Result<Vec<u8>, HttpStoreError> {
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| HttpStoreError::Config("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(HttpStoreError::TooLarge(max_bytes));
    }
    let mut buf = Vec::new();
    let mut handle = response.take(max_bytes_u64.saturating_add(1));
    handle.read_to_end(&mut buf).map_err(|err| HttpStoreError::Transport(err.to_string()))?;
    if buf.len() > max_bytes {
        return Err(HttpStoreError::TooLarge(max_bytes));
    }
    Ok(buf)
}
