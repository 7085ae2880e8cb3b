// crates/ccguard-cobertura/src/report.rs
// ============================================================================
// Module: Cobertura Report
// Description: Parsed Cobertura document with per-file line hits.
// Purpose: Expose statements, misses, and line rates per file and in total.
// Dependencies: ccguard-core, roxmltree, tracing
// ============================================================================

//! ## Overview
//! A statement is a `<line>` element; a miss is a line with zero hits. Line
//! numbers reported by several classes of one file are merged by summing
//! their hits. The total line rate is the root `line-rate` attribute when
//! present, since that is the figure the coverage tool published.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;

use ccguard_core::CoverageReport;
use ccguard_core::ReportError;
use roxmltree::Document;
use roxmltree::Node;
use roxmltree::ParsingOptions;
use tracing::debug;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Line hits recorded for one file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileCoverage {
    /// Hit count per line number.
    pub lines: BTreeMap<u64, u64>,
}

impl FileCoverage {
    /// Returns the number of instrumented lines.
    #[must_use]
    pub fn statements(&self) -> u64 {
        self.lines.len() as u64
    }

    /// Returns the number of lines never executed.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.lines.values().filter(|hits| **hits == 0).count() as u64
    }

    /// Returns the line numbers never executed.
    #[must_use]
    pub fn missed_lines(&self) -> BTreeSet<u64> {
        self.lines.iter().filter(|(_, hits)| **hits == 0).map(|(line, _)| *line).collect()
    }

    /// Returns covered lines divided by statements, 1.0 without statements.
    #[must_use]
    pub fn line_rate(&self) -> f64 {
        ratio(self.statements() - self.misses(), self.statements())
    }
}

/// Parsed Cobertura report.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoberturaReport {
    /// Root `line-rate`, when the document carries one.
    declared_line_rate: Option<f64>,
    /// Coverage keyed by file path.
    files: BTreeMap<String, FileCoverage>,
}

impl CoberturaReport {
    /// Parses a Cobertura document.
    ///
    /// When `source_root` is given, absolute file names under it are made
    /// relative to it.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Corrupt`] when the payload is not UTF-8, not
    /// XML, not rooted at `<coverage>`, or carries malformed line records.
    pub fn parse(payload: &[u8], source_root: Option<&Path>) -> Result<Self, ReportError> {
        let text = std::str::from_utf8(payload)
            .map_err(|err| ReportError::Corrupt(format!("payload is not UTF-8: {err}")))?;
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let document = Document::parse_with_options(text, options)
            .map_err(|err| ReportError::Corrupt(err.to_string()))?;
        let root = document.root_element();
        if !root.has_tag_name("coverage") {
            return Err(ReportError::Corrupt(format!(
                "unexpected root element <{}>",
                root.tag_name().name()
            )));
        }
        let declared_line_rate = root
            .attribute("line-rate")
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite());

        let mut files: BTreeMap<String, FileCoverage> = BTreeMap::new();
        for class in root.descendants().filter(|node| node.has_tag_name("class")) {
            let Some(filename) = class.attribute("filename") else {
                return Err(ReportError::Corrupt("class without filename".to_string()));
            };
            let entry = files.entry(normalize(filename, source_root)).or_default();
            for line in class_lines(class) {
                let (number, hits) = parse_line(line)?;
                let total = entry.lines.entry(number).or_insert(0);
                *total = total.saturating_add(hits);
            }
        }
        debug!(files = files.len(), "cobertura report parsed");
        Ok(Self {
            declared_line_rate,
            files,
        })
    }

    /// Returns the coverage of one file.
    #[must_use]
    pub fn file(&self, file: &str) -> Option<&FileCoverage> {
        self.files.get(file)
    }
}

impl CoverageReport for CoberturaReport {
    fn files(&self) -> BTreeSet<String> {
        self.files.keys().cloned().collect()
    }

    fn line_rate(&self) -> f64 {
        self.declared_line_rate.unwrap_or_else(|| {
            let statements = self.statements(None);
            ratio(statements - self.misses(None), statements)
        })
    }

    fn file_line_rate(&self, file: &str) -> Option<f64> {
        self.files.get(file).map(FileCoverage::line_rate)
    }

    fn statements(&self, file: Option<&str>) -> u64 {
        match file {
            Some(file) => self.files.get(file).map_or(0, FileCoverage::statements),
            None => self.files.values().map(FileCoverage::statements).sum(),
        }
    }

    fn misses(&self, file: Option<&str>) -> u64 {
        match file {
            Some(file) => self.files.get(file).map_or(0, FileCoverage::misses),
            None => self.files.values().map(FileCoverage::misses).sum(),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the `<line>` records directly under a class's `<lines>` element.
fn class_lines<'a, 'input>(class: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    class
        .children()
        .filter(|node| node.has_tag_name("lines"))
        .flat_map(|lines| lines.children().filter(|node| node.has_tag_name("line")))
}

/// Parses the `number` and `hits` attributes of a line record.
fn parse_line(line: Node<'_, '_>) -> Result<(u64, u64), ReportError> {
    let number = line
        .attribute("number")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .ok_or_else(|| ReportError::Corrupt("line without a valid number".to_string()))?;
    let hits = line
        .attribute("hits")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .ok_or_else(|| ReportError::Corrupt(format!("line {number} without valid hits")))?;
    Ok((number, hits))
}

/// Strips `source_root` from absolute file names beneath it.
fn normalize(filename: &str, source_root: Option<&Path>) -> String {
    let Some(root) = source_root else {
        return filename.to_string();
    };
    Path::new(filename)
        .strip_prefix(root)
        .map_or_else(|_| filename.to_string(), |relative| relative.to_string_lossy().into_owned())
}

/// Returns `part / whole`, or 1.0 when `whole` is zero.
#[allow(clippy::cast_precision_loss, reason = "line counts stay far below 2^52")]
fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 1.0;
    }
    part as f64 / whole as f64
}
