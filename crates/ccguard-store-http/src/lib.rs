// crates/ccguard-store-http/src/lib.rs
// ============================================================================
// Module: ccguard HTTP Reference Store
// Description: Remote ReferenceStore backend over a request/response protocol.
// Purpose: Let CI jobs share references through a central ccguard server.
// Dependencies: ccguard-core, reqwest
// ============================================================================

//! ## Overview
//! Every operation is a blocking HTTP call against
//! `{server}/api/v1/references/{repository}/...`. Writes carry a bearer
//! token. Malformed responses never crash a check: listings degrade to an
//! empty result and summaries to `None`, each with a logged warning.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::HttpReferenceStore;
pub use store::HttpStoreConfig;
pub use store::HttpStoreError;
