//! Coverage matrix: which lines each test case executed, and its verdict.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Spectrum counters for one line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Spectrum {
    /// Failing test cases that execute the line
    pub ef: usize,
    /// Passing test cases that execute the line
    pub ep: usize,
    /// Failing test cases that do not execute the line
    pub nf: usize,
    /// Passing test cases that do not execute the line
    pub np: usize,
}

impl Spectrum {
    #[must_use]
    pub const fn total_failing(&self) -> usize {
        self.ef + self.nf
    }

    #[must_use]
    pub const fn total_passing(&self) -> usize {
        self.ep + self.np
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Entry {
    covered: BTreeSet<u32>,
    passed: bool,
}

/// Per-test-case coverage and verdicts.
///
/// Coverage and verdict live in the same entry, so every recorded test case
/// always has both.
#[derive(Debug, Clone, Default)]
pub struct CoverageMatrix {
    entries: BTreeMap<String, Entry>,
}

impl CoverageMatrix {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a test case; a later call with the same name replaces it
    pub fn add_test_case(
        &mut self,
        name: impl Into<String>,
        covered_lines: impl IntoIterator<Item = u32>,
        passed: bool,
    ) {
        self.entries.insert(
            name.into(),
            Entry {
                covered: covered_lines.into_iter().collect(),
                passed,
            },
        );
    }

    /// Overwrite the verdict of a recorded test case.
    ///
    /// Returns `false` and records nothing for unknown names.
    pub fn set_result(&mut self, name: &str, passed: bool) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.passed = passed;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded test case names, sorted
    pub fn test_cases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn passed(&self, name: &str) -> Option<bool> {
        self.entries.get(name).map(|e| e.passed)
    }

    #[must_use]
    pub fn covered_lines(&self, name: &str) -> Option<&BTreeSet<u32>> {
        self.entries.get(name).map(|e| &e.covered)
    }

    #[must_use]
    pub fn failing_tests(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| !e.passed)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    #[must_use]
    pub fn passing_tests(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.passed)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    #[must_use]
    pub fn num_failing(&self) -> usize {
        self.entries.values().filter(|e| !e.passed).count()
    }

    #[must_use]
    pub fn num_passing(&self) -> usize {
        self.entries.values().filter(|e| e.passed).count()
    }

    /// Union of all covered lines
    #[must_use]
    pub fn all_lines(&self) -> BTreeSet<u32> {
        self.entries
            .values()
            .flat_map(|e| e.covered.iter().copied())
            .collect()
    }

    /// Names of test cases that executed `line`
    #[must_use]
    pub fn line_covered_by(&self, line: u32) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.covered.contains(&line))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Whether any failing test case executed `line`
    #[must_use]
    pub fn is_covered_by_failing(&self, line: u32) -> bool {
        self.entries
            .values()
            .any(|e| !e.passed && e.covered.contains(&line))
    }

    /// Spectrum counters for `line` over every recorded test case
    #[must_use]
    pub fn spectrum(&self, line: u32) -> Spectrum {
        let mut spectrum = Spectrum::default();
        for entry in self.entries.values() {
            match (entry.passed, entry.covered.contains(&line)) {
                (false, true) => spectrum.ef += 1,
                (true, true) => spectrum.ep += 1,
                (false, false) => spectrum.nf += 1,
                (true, false) => spectrum.np += 1,
            }
        }
        spectrum
    }
}
