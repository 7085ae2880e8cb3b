// crates/ccguard-git/src/lib.rs
// ============================================================================
// Module: ccguard Git
// Description: libgit2-backed version-control collaborator.
// Purpose: Answer history questions for the check workflow in-process.
// Dependencies: ccguard-core, git2
// ============================================================================

//! ## Overview
//! [`GitRepository`] implements [`ccguard_core::VersionControl`] without
//! spawning `git`. Ancestors are streamed through a revwalk in
//! nearest-first topological order, one window at a time.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod repository;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use repository::GitRepository;
