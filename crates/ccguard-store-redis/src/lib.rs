// crates/ccguard-store-redis/src/lib.rs
// ============================================================================
// Module: ccguard Redis Reference Store
// Description: Key/value ReferenceStore backend using Redis hashes.
// Purpose: Share references across CI runners through a Redis service.
// Dependencies: ccguard-core, redis
// ============================================================================

//! ## Overview
//! References live in one Redis hash per repository and subtype, keyed by
//! commit. Writes use `HSETNX`, so racing writers keep the first payload.
//! The backend has no ordering: listing ignores branch and limit filters.
//!
//! The store talks to Redis through the [`HashConnection`] seam so the
//! contract can be exercised without a server.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod connection;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use connection::HashConnection;
pub use connection::RedisConnection;
pub use store::RedisReferenceStore;
pub use store::RedisStoreConfig;
pub use store::RedisStoreError;
