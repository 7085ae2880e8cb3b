// crates/ccguard-config/src/lib.rs
// ============================================================================
// Module: ccguard Config Library
// Description: Canonical config model, layered loading, and validation.
// Purpose: Single source of truth for .ccguard.toml semantics.
// Dependencies: ccguard-core, ccguard store crates, serde, toml
// ============================================================================

//! ## Overview
//! `ccguard-config` resolves configuration once at startup into a
//! [`CcguardConfig`] value that is passed explicitly to backend
//! constructors. Validation is strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
