// crates/ccguard-store-sqlite/src/lib.rs
// ============================================================================
// Module: ccguard SQLite Reference Store
// Description: Embedded ReferenceStore backend using SQLite.
// Purpose: Provide the default, single-file persistence for coverage references.
// Dependencies: ccguard-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`ReferenceStore`] with one table per
//! repository identity. It is the only backend that orders listings by
//! collection time, filters by branch, counts reads, and offloads rarely
//! used payloads to long-term storage on disk.
//!
//! [`ReferenceStore`]: ccguard_core::ReferenceStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::OffloadCandidate;
pub use store::SqliteJournalMode;
pub use store::SqliteReferenceStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteSyncMode;
