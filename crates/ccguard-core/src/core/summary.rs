// crates/ccguard-core/src/core/summary.rs
// ============================================================================
// Module: ccguard Summary Extraction
// Description: Reads coverage totals from a payload's root element.
// Purpose: Precompute badge-ready totals at persist time.
// Dependencies: crate::core::reference, roxmltree
// ============================================================================

//! ## Overview
//! Only the root `line-rate`, `lines-covered`, and `lines-valid` attributes are
//! read. Payloads that cannot be parsed yield a zero summary; rejecting
//! corrupt reports is the report parser's job, not the store's.

// ============================================================================
// SECTION: Imports
// ============================================================================

use roxmltree::Document;
use roxmltree::ParsingOptions;

use crate::core::reference::CoverageSummary;

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Extracts the coverage summary from a serialized report.
#[must_use]
pub fn summarize_payload(payload: &[u8]) -> CoverageSummary {
    let Ok(text) = std::str::from_utf8(payload) else {
        return CoverageSummary::default();
    };
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let Ok(document) = Document::parse_with_options(text, options) else {
        return CoverageSummary::default();
    };
    let root = document.root_element();
    let line_rate = root
        .attribute("line-rate")
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0);
    let lines_covered = root
        .attribute("lines-covered")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let lines_valid =
        root.attribute("lines-valid").and_then(|value| value.trim().parse::<u64>().ok()).unwrap_or(0);
    CoverageSummary {
        line_rate,
        lines_covered,
        lines_valid,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
