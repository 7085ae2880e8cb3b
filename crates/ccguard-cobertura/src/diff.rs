// crates/ccguard-cobertura/src/diff.rs
// ============================================================================
// Module: Cobertura Diff
// Description: Reference/challenger pairing of two Cobertura reports.
// Purpose: Answer line-level questions the regression policy asks.
// Dependencies: ccguard-core
// ============================================================================

//! ## Overview
//! A line is new when the reference file does not record it, or the file
//! is absent from the reference altogether. Count deltas come from the
//! default [`CoverageDiff`] methods.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use ccguard_core::CoverageDiff;
use ccguard_core::CoverageReport;

use crate::report::CoberturaReport;

// ============================================================================
// SECTION: Diff
// ============================================================================

/// Pairing of a reference report with a challenger report.
#[derive(Debug, Clone)]
pub struct CoberturaDiff {
    /// Report recorded for the reference commit.
    reference: CoberturaReport,
    /// Report under evaluation.
    challenger: CoberturaReport,
}

impl CoberturaDiff {
    /// Pairs `reference` with `challenger`.
    #[must_use]
    pub const fn new(reference: CoberturaReport, challenger: CoberturaReport) -> Self {
        Self {
            reference,
            challenger,
        }
    }

    /// Returns missed challenger lines that the reference does not record, per file.
    #[must_use]
    pub fn uncovered_new_lines(&self) -> BTreeMap<String, Vec<u64>> {
        let mut out = BTreeMap::new();
        for file in self.challenger.files() {
            let Some(challenger) = self.challenger.file(&file) else {
                continue;
            };
            let reference = self.reference.file(&file);
            let lines: Vec<u64> = challenger
                .missed_lines()
                .into_iter()
                .filter(|line| reference.is_none_or(|known| !known.lines.contains_key(line)))
                .collect();
            if !lines.is_empty() {
                out.insert(file, lines);
            }
        }
        out
    }
}

impl CoverageDiff for CoberturaDiff {
    fn reference(&self) -> &dyn CoverageReport {
        &self.reference
    }

    fn challenger(&self) -> &dyn CoverageReport {
        &self.challenger
    }

    fn all_new_lines_covered(&self) -> bool {
        self.uncovered_new_lines().is_empty()
    }
}
