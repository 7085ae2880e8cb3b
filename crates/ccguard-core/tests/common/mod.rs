// crates/ccguard-core/tests/common/mod.rs
// =============================================================================
// Module: Core Test Helpers
// Description: In-memory coverage reports and diffs for policy tests.
// Purpose: Reduce duplication across integration tests for ccguard-core.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use ccguard_core::CoverageDiff;
use ccguard_core::CoverageReport;

/// Report built from `(file, statements, misses)` triples.
#[derive(Debug, Clone, Default)]
pub struct FakeReport {
    files: BTreeMap<String, (u64, u64)>,
}

impl FakeReport {
    /// Builds a report from `(file, statements, misses)` triples.
    pub fn new(entries: &[(&str, u64, u64)]) -> Self {
        Self {
            files: entries
                .iter()
                .map(|(file, statements, misses)| ((*file).to_string(), (*statements, *misses)))
                .collect(),
        }
    }
}

fn rate(statements: u64, misses: u64) -> f64 {
    if statements == 0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss, reason = "Fixture counts are small.")]
    let value = (statements - misses) as f64 / statements as f64;
    value
}

impl CoverageReport for FakeReport {
    fn files(&self) -> BTreeSet<String> {
        self.files.keys().cloned().collect()
    }

    fn line_rate(&self) -> f64 {
        rate(self.statements(None), self.misses(None))
    }

    fn file_line_rate(&self, file: &str) -> Option<f64> {
        self.files.get(file).map(|(statements, misses)| rate(*statements, *misses))
    }

    fn statements(&self, file: Option<&str>) -> u64 {
        match file {
            Some(file) => self.files.get(file).map_or(0, |entry| entry.0),
            None => self.files.values().map(|entry| entry.0).sum(),
        }
    }

    fn misses(&self, file: Option<&str>) -> u64 {
        match file {
            Some(file) => self.files.get(file).map_or(0, |entry| entry.1),
            None => self.files.values().map(|entry| entry.1).sum(),
        }
    }
}

/// Diff over two fake reports.
#[derive(Debug, Clone, Default)]
pub struct FakeDiff {
    pub reference: FakeReport,
    pub challenger: FakeReport,
}

impl FakeDiff {
    pub fn new(reference: &[(&str, u64, u64)], challenger: &[(&str, u64, u64)]) -> Self {
        Self {
            reference: FakeReport::new(reference),
            challenger: FakeReport::new(challenger),
        }
    }
}

impl CoverageDiff for FakeDiff {
    fn reference(&self) -> &dyn CoverageReport {
        &self.reference
    }

    fn challenger(&self) -> &dyn CoverageReport {
        &self.challenger
    }

    fn all_new_lines_covered(&self) -> bool {
        self.challenger.misses(None) <= self.reference.misses(None)
    }
}

/// Minimal Cobertura payload with the given root totals.
pub fn cobertura_payload(line_rate: &str, covered: u64, valid: u64) -> Vec<u8> {
    format!(
        "<?xml version=\"1.0\" ?>\n<coverage line-rate=\"{line_rate}\" lines-covered=\"{covered}\" \
         lines-valid=\"{valid}\" version=\"7.0\"><packages/></coverage>"
    )
    .into_bytes()
}
