//! Test case discovery.
//!
//! A test case is a directory holding numbered iteration files:
//!
//! ```text
//! tests/
//!   n1/  t1 output.t1 t2 output.t2 ...   expected to fail
//!   p1/  t1 output.t1 ...                expected to pass
//! ```
//!
//! The name prefix is only a hint; the runner's verdict always wins.

use crate::result::FaultlineResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name prefixes marking expected-failing and expected-passing test cases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    pub negative_prefix: String,
    pub positive_prefix: String,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            negative_prefix: "n".to_string(),
            positive_prefix: "p".to_string(),
        }
    }
}

impl NamingConvention {
    /// `Some(expected_pass)` for names carrying either prefix.
    ///
    /// The negative prefix is checked first.
    #[must_use]
    pub fn classify(&self, name: &str) -> Option<bool> {
        if name.starts_with(&self.negative_prefix) {
            Some(false)
        } else if name.starts_with(&self.positive_prefix) {
            Some(true)
        } else {
            None
        }
    }
}

/// One discovered test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub path: PathBuf,
    pub iteration_count: usize,
    /// Advisory verdict from the naming convention
    pub expected_outcome: bool,
}

impl TestCase {
    /// Inspect a test case directory; `None` if it holds no `t1`
    #[must_use]
    pub fn from_directory(dir: &Path, expected_outcome: bool) -> Option<Self> {
        let name = dir.file_name()?.to_string_lossy().into_owned();
        let iteration_count = count_iterations(dir);
        (iteration_count > 0).then(|| Self {
            name,
            path: dir.to_path_buf(),
            iteration_count,
            expected_outcome,
        })
    }

    /// Input file for a 1-based iteration
    #[must_use]
    pub fn input_path(&self, iteration: usize) -> PathBuf {
        self.path.join(format!("t{iteration}"))
    }

    /// Oracle file for a 1-based iteration
    #[must_use]
    pub fn oracle_path(&self, iteration: usize) -> PathBuf {
        self.path.join(format!("output.t{iteration}"))
    }

    /// Find test cases under `base_dir`, sorted by name.
    ///
    /// Only directories matching the naming convention with at least one
    /// iteration are returned. Paths are absolute, so runners may change
    /// directory before reading them.
    pub fn discover(base_dir: &Path, naming: &NamingConvention) -> FaultlineResult<Vec<Self>> {
        let base_dir = base_dir.canonicalize()?;
        let mut cases = Vec::new();
        for entry in std::fs::read_dir(&base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(expected) = naming.classify(&name) else {
                continue;
            };
            match Self::from_directory(&entry.path(), expected) {
                Some(case) => cases.push(case),
                None => tracing::debug!(test_case = %name, "skipping directory without iterations"),
            }
        }
        cases.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::info!(
            base_dir = %base_dir.display(),
            count = cases.len(),
            "discovered test cases"
        );
        Ok(cases)
    }
}

/// Count consecutive `t1`, `t2`, ... files
fn count_iterations(dir: &Path) -> usize {
    (1..)
        .take_while(|i| dir.join(format!("t{i}")).is_file())
        .count()
}
