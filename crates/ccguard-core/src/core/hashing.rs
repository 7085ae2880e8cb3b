// crates/ccguard-core/src/core/hashing.rs
// ============================================================================
// Module: ccguard Payload Digests
// Description: Content digests for stored coverage payloads.
// Purpose: Detect payload corruption across inline and offloaded storage.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! Backends that keep payloads on disk record a digest at persist time and
//! compare it on every read, so a damaged row or long-term file surfaces as
//! corruption instead of feeding garbage to the report parser.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Digest
// ============================================================================

/// Label stored next to digests produced by [`payload_digest`].
pub const PAYLOAD_DIGEST_ALGORITHM: &str = "sha256";

/// Returns the lowercase hex SHA-256 digest of a payload.
#[must_use]
pub fn payload_digest(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hex_encode(&hasher.finalize())
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[usize::from(byte >> 4)] as char);
        out.push(HEX[usize::from(byte & 0x0f)] as char);
    }
    out
}
