//! Gcov report parsing.
//!
//! A `.gcov` file annotates every source line with an execution marker:
//!
//! ```text
//!         -:    0:Source:controller.c
//!         3:   12:    int x = compute();
//!     #####:   13:    reset();
//!         -:   14:    /* comment */
//! ```
//!
//! Markers are a decimal count (optionally suffixed with `*` for partially
//! executed blocks), `-` for non-executable lines, and `#####`, `=====` or a
//! run of `*` for executable lines that never ran. Line 0 carries header
//! metadata and is dropped. Lines that match none of this are skipped.

use crate::result::FaultlineResult;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

/// One annotated source line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GcovLine {
    pub line_number: u32,
    /// `None` for non-executable lines
    pub execution_count: Option<u64>,
    pub source_text: String,
    pub is_executable: bool,
}

impl GcovLine {
    /// Whether the line ran at least once
    #[must_use]
    pub fn was_executed(&self) -> bool {
        self.execution_count.is_some_and(|count| count > 0)
    }
}

#[allow(clippy::expect_used)]
fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([0-9]+\*?|-|#####|=====|\*+):\s*(\d+):(.*)$")
            .expect("gcov line pattern is valid")
    })
}

fn parse_line(raw: &str) -> Option<GcovLine> {
    let caps = line_pattern().captures(raw.trim_end_matches(['\r', '\n']))?;
    let marker = caps.get(1)?.as_str();
    let line_number: u32 = caps.get(2)?.as_str().parse().ok()?;
    if line_number == 0 {
        return None;
    }
    let source_text = caps.get(3).map_or("", |m| m.as_str()).to_string();

    let (execution_count, is_executable) = match marker {
        "-" => (None, false),
        "#####" | "=====" => (Some(0), true),
        m if m.starts_with('*') => (Some(0), true),
        m => match m.trim_end_matches('*').parse::<u64>() {
            Ok(count) => (Some(count), true),
            Err(_) => (None, false),
        },
    };

    Some(GcovLine {
        line_number,
        execution_count,
        source_text,
        is_executable,
    })
}

/// Parse report text into annotated lines, in file order
#[must_use]
pub fn parse(report_text: &str) -> Vec<GcovLine> {
    report_text.lines().filter_map(parse_line).collect()
}

/// A parsed gcov report with coverage queries
#[derive(Debug, Clone, Default, Serialize)]
pub struct GcovReport {
    lines: Vec<GcovLine>,
}

impl GcovReport {
    /// Parse report text
    #[must_use]
    pub fn from_text(report_text: &str) -> Self {
        Self {
            lines: parse(report_text),
        }
    }

    /// Read and parse a `.gcov` file; invalid UTF-8 is replaced
    pub fn from_file(path: &Path) -> FaultlineResult<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_text(&String::from_utf8_lossy(&bytes)))
    }

    #[must_use]
    pub fn lines(&self) -> &[GcovLine] {
        &self.lines
    }

    /// Lines executed at least once
    #[must_use]
    pub fn executed_lines(&self) -> BTreeSet<u32> {
        self.lines
            .iter()
            .filter(|l| l.was_executed())
            .map(|l| l.line_number)
            .collect()
    }

    /// Lines that carry executable code
    #[must_use]
    pub fn executable_lines(&self) -> BTreeSet<u32> {
        self.lines
            .iter()
            .filter(|l| l.is_executable)
            .map(|l| l.line_number)
            .collect()
    }

    /// Executable lines that never ran
    #[must_use]
    pub fn not_executed_lines(&self) -> BTreeSet<u32> {
        self.lines
            .iter()
            .filter(|l| l.is_executable && !l.was_executed())
            .map(|l| l.line_number)
            .collect()
    }

    /// Source text per line number
    #[must_use]
    pub fn source_lines(&self) -> BTreeMap<u32, String> {
        self.lines
            .iter()
            .map(|l| (l.line_number, l.source_text.clone()))
            .collect()
    }
}
