// crates/ccguard-store-http/tests/http_store.rs
// ============================================================================
// Module: HTTP Store Tests
// Description: Validate the HTTP ReferenceStore against in-process servers.
// Purpose: Ensure protocol mapping, token handling, and graceful degradation.
// Dependencies: ccguard-store-http, ccguard-core, tiny_http, base64, serde_json
// ============================================================================

//! ## Overview
//! A stateful fake server implements the reference protocol for contract
//! tests; one-shot servers return canned bodies for malformed-response tests.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ccguard_core::BranchName;
use ccguard_core::CommitId;
use ccguard_core::CommitQuery;
use ccguard_core::InMemoryReferenceStore;
use ccguard_core::NewReference;
use ccguard_core::PersistOutcome;
use ccguard_core::ReferenceStore;
use ccguard_core::RepositoryId;
use ccguard_core::StoreError;
use ccguard_core::Subtype;
use ccguard_core::summarize_payload;
use ccguard_core::transfer;
use ccguard_store_http::HttpReferenceStore;
use ccguard_store_http::HttpStoreConfig;
use ccguard_store_http::HttpStoreError;
use reqwest::Url;
use serde_json::json;
use tiny_http::Header;
use tiny_http::Method;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Fake Server
// ============================================================================

const TOKEN: &str = "secret";
const PAYLOAD: &[u8] = br#"<coverage line-rate="0.25" lines-covered="1" lines-valid="4"/>"#;

#[derive(Debug, Clone)]
struct Record {
    commit: String,
    subtype: String,
    branch: Option<String>,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct RemoteState {
    records: Vec<Record>,
    paths: Vec<String>,
}

struct FakeRemote {
    url: String,
    server: Arc<Server>,
    state: Arc<Mutex<RemoteState>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FakeRemote {
    fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let state = Arc::new(Mutex::new(RemoteState::default()));
        let handle = {
            let server = Arc::clone(&server);
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let mut body = Vec::new();
                    request.as_reader().read_to_end(&mut body).unwrap();
                    let authorized = request.headers().iter().any(|header| {
                        header.field.equiv("Authorization")
                            && header.value.as_str() == format!("Bearer {TOKEN}")
                    });
                    let (status, data) = route(
                        &mut state.lock().unwrap(),
                        request.method(),
                        request.url(),
                        authorized,
                        body,
                    );
                    let _ = request.respond(Response::from_data(data).with_status_code(status));
                }
            })
        };
        Self {
            url: format!("http://{addr}"),
            server,
            state,
            handle: Some(handle),
        }
    }

    fn paths(&self) -> Vec<String> {
        self.state.lock().unwrap().paths.clone()
    }
}

impl Drop for FakeRemote {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn route(
    state: &mut RemoteState,
    method: &Method,
    raw_url: &str,
    authorized: bool,
    body: Vec<u8>,
) -> (u16, Vec<u8>) {
    state.paths.push(raw_url.to_string());
    let url = Url::parse(&format!("http://fake{raw_url}")).unwrap();
    let query: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
    let subtype = query.get("subtype").cloned().unwrap_or_else(|| "default".to_string());
    let segments: Vec<&str> = url.path_segments().unwrap().collect();
    match (method, segments.as_slice()) {
        (Method::Get, ["api", "v1", "references", _, "all"]) => {
            let limit = query.get("limit").and_then(|value| value.parse::<usize>().ok());
            let commits: Vec<&str> = state
                .records
                .iter()
                .rev()
                .filter(|record| record.subtype == subtype)
                .filter(|record| {
                    query.get("branch").is_none_or(|branch| record.branch.as_ref() == Some(branch))
                })
                .map(|record| record.commit.as_str())
                .take(limit.unwrap_or(usize::MAX))
                .collect();
            (200, serde_json::to_vec(&commits).unwrap())
        }
        (Method::Get, ["api", "v1", "references", _, "data"]) => {
            let records: Vec<_> = state
                .records
                .iter()
                .map(|record| {
                    json!({
                        "commit_id": record.commit,
                        "subtype": record.subtype,
                        "branch": record.branch,
                        "data": STANDARD.encode(&record.data),
                    })
                })
                .collect();
            (200, serde_json::to_vec(&records).unwrap())
        }
        (Method::Get, ["api", "v1", "references", _, commit, "data"]) => {
            find(state, commit, &subtype)
                .map_or((404, Vec::new()), |record| (200, record.data.clone()))
        }
        (Method::Get, ["api", "v1", "references", _, commit, "summary"]) => {
            find(state, commit, &subtype).map_or((404, Vec::new()), |record| {
                (200, serde_json::to_vec(&summarize_payload(&record.data)).unwrap())
            })
        }
        (Method::Put, ["api", "v1", "references", _, commit, "data"]) => {
            if !authorized {
                return (401, Vec::new());
            }
            if find(state, commit, &subtype).is_some() {
                return (409, Vec::new());
            }
            state.records.push(Record {
                commit: (*commit).to_string(),
                subtype,
                branch: query.get("branch").cloned(),
                data: body,
            });
            (201, Vec::new())
        }
        _ => (400, Vec::new()),
    }
}

fn find<'a>(state: &'a RemoteState, commit: &str, subtype: &str) -> Option<&'a Record> {
    state.records.iter().find(|record| record.commit == commit && record.subtype == subtype)
}

/// Spawns a server that answers every request with the given body and status.
fn spawn_canned(body: &'static str, status: u16) -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        if let Ok(request) = server.recv() {
            let header = Header::from_bytes("Content-Type", "application/json").unwrap();
            let response = Response::from_string(body).with_status_code(status).with_header(header);
            let _ = request.respond(response);
        }
    });
    (format!("http://{addr}"), handle)
}

fn repository() -> RepositoryId {
    RepositoryId::parse("root42").unwrap()
}

fn store_for(url: &str, token: Option<&str>) -> HttpReferenceStore {
    let mut config = HttpStoreConfig::new(url);
    config.token = token.map(str::to_string);
    config.timeout_ms = 5_000;
    HttpReferenceStore::new(config, repository()).unwrap()
}

// ============================================================================
// SECTION: Contract Tests
// ============================================================================

#[test]
fn round_trip_through_remote() {
    let remote = FakeRemote::start();
    let store = store_for(&remote.url, Some(TOKEN));
    assert_eq!(store.persist(&NewReference::new("c1", PAYLOAD)).unwrap(), PersistOutcome::Stored);
    let loaded = store.retrieve(&CommitId::from("c1"), &Subtype::default()).unwrap();
    assert_eq!(loaded.as_deref(), Some(PAYLOAD));
    assert!(remote.paths().contains(&"/api/v1/references/root42/c1/data".to_string()));
}

#[test]
fn conflict_is_already_exists() {
    let remote = FakeRemote::start();
    let store = store_for(&remote.url, Some(TOKEN));
    store.persist(&NewReference::new("c1", PAYLOAD)).unwrap();
    let outcome = store.persist(&NewReference::new("c1", b"other".to_vec())).unwrap();
    assert_eq!(outcome, PersistOutcome::AlreadyExists);
}

#[test]
fn not_found_is_absent() {
    let remote = FakeRemote::start();
    let store = store_for(&remote.url, None);
    assert_eq!(store.retrieve(&CommitId::from("nope"), &Subtype::default()).unwrap(), None);
    assert_eq!(store.summary(&CommitId::from("nope"), &Subtype::default()).unwrap(), None);
}

#[test]
fn writes_require_a_token() {
    let remote = FakeRemote::start();
    let store = store_for(&remote.url, None);
    let err = store.persist(&NewReference::new("c1", PAYLOAD)).unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
    assert!(remote.paths().is_empty());
}

#[test]
fn transfer_into_read_only_remote_fails() {
    let remote = FakeRemote::start();
    let source = InMemoryReferenceStore::new();
    source.persist(&NewReference::new("c1", PAYLOAD)).unwrap();
    let dest = store_for(&remote.url, None);

    let result = transfer(None, &Subtype::default(), &source, &dest);
    assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    let single = transfer(Some(&CommitId::from("c1")), &Subtype::default(), &source, &dest);
    assert!(matches!(single, Err(StoreError::InvalidArgument(_))));
    assert!(remote.paths().is_empty());
}

#[test]
fn wrong_token_is_a_store_error() {
    let remote = FakeRemote::start();
    let store = store_for(&remote.url, Some("wrong"));
    let err = store.persist(&NewReference::new("c1", PAYLOAD)).unwrap_err();
    assert!(matches!(err, StoreError::Store(_)));
}

#[test]
fn listing_forwards_filters() {
    let remote = FakeRemote::start();
    let store = store_for(&remote.url, Some(TOKEN));
    let main = Some(BranchName::from("main"));
    store.persist(&NewReference::new("c1", PAYLOAD).with_branch(main.clone())).unwrap();
    store.persist(&NewReference::new("c2", PAYLOAD)).unwrap();
    store.persist(&NewReference::new("c3", PAYLOAD).with_branch(main.clone())).unwrap();
    store.persist(&NewReference::new("c4", PAYLOAD).with_subtype(Subtype::from("it"))).unwrap();

    let defaults = store.known_commits(&Subtype::default()).unwrap();
    assert_eq!(defaults.len(), 3);
    let latest = store.list_commits(&CommitQuery::latest_on(main, Some(Subtype::default()))).unwrap();
    assert_eq!(latest, vec![CommitId::from("c3")]);
    assert!(
        remote
            .paths()
            .contains(&"/api/v1/references/root42/all?subtype=default&branch=main&limit=1".to_string())
    );
}

#[test]
fn summary_and_dump_round_trip() {
    let remote = FakeRemote::start();
    let store = store_for(&remote.url, Some(TOKEN));
    store
        .persist(&NewReference::new("c1", PAYLOAD).with_branch(Some(BranchName::from("dev"))))
        .unwrap();
    store.persist(&NewReference::new("c2", b"\x00\x01raw".to_vec()).with_subtype(Subtype::from("it"))).unwrap();

    let summary = store.summary(&CommitId::from("c1"), &Subtype::default()).unwrap().unwrap();
    assert_eq!(summary.percent(), 25);

    let dump = store.dump().unwrap();
    assert_eq!(dump.len(), 2);
    assert_eq!(dump[0].branch, Some(BranchName::from("dev")));
    assert_eq!(dump[1].subtype, Subtype::from("it"));
    assert_eq!(dump[1].payload, b"\x00\x01raw".to_vec());
}

// ============================================================================
// SECTION: Degradation Tests
// ============================================================================

#[test]
fn malformed_listing_degrades_to_empty() {
    let (url, handle) = spawn_canned("<html>oops</html>", 200);
    let store = store_for(&url, None);
    assert!(store.list_commits(&CommitQuery::default()).unwrap().is_empty());
    handle.join().unwrap();
}

#[test]
fn malformed_summary_degrades_to_none() {
    let (url, handle) = spawn_canned("{\"line_rate\": \"nope\"", 200);
    let store = store_for(&url, None);
    assert_eq!(store.summary(&CommitId::from("c1"), &Subtype::default()).unwrap(), None);
    handle.join().unwrap();
}

#[test]
fn malformed_dump_degrades_to_empty() {
    let (url, handle) = spawn_canned("not json", 200);
    let store = store_for(&url, None);
    assert!(store.dump().unwrap().is_empty());
    handle.join().unwrap();
}

#[test]
fn server_errors_are_unavailable() {
    let (url, handle) = spawn_canned("boom", 503);
    let store = store_for(&url, None);
    let err = store.retrieve(&CommitId::from("c1"), &Subtype::default()).unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    handle.join().unwrap();
}

#[test]
fn oversized_response_is_rejected() {
    let (url, handle) = spawn_canned("0123456789abcdef", 200);
    let mut config = HttpStoreConfig::new(url);
    config.max_response_bytes = 4;
    let store = HttpReferenceStore::new(config, repository()).unwrap();
    let err = store.retrieve(&CommitId::from("c1"), &Subtype::default()).unwrap_err();
    assert!(matches!(err, StoreError::Store(_)));
    handle.join().unwrap();
}

#[test]
fn non_http_server_address_is_rejected() {
    let result = HttpReferenceStore::new(HttpStoreConfig::new("ftp://example.com"), repository());
    assert!(matches!(result, Err(HttpStoreError::Config(_))));
    let result = HttpReferenceStore::new(HttpStoreConfig::new("not a url"), repository());
    assert!(matches!(result, Err(HttpStoreError::Config(_))));
}
