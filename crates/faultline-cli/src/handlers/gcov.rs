//! Gcov command handler

use super::print_json;
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::OutputFormat;
use crate::GcovArgs;
use faultline::GcovReport;
use serde::Serialize;
use std::fmt::Write as _;

/// Line counts of one gcov report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GcovSummary {
    /// Lines executed at least once
    pub executed: usize,
    /// Lines carrying code
    pub executable: usize,
    /// Executable lines that never ran
    pub not_executed: usize,
    /// Executed line numbers, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_lines: Option<Vec<u32>>,
}

impl GcovSummary {
    /// Executed share of executable lines, in percent
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.executable == 0 {
            0.0
        } else {
            self.executed as f64 * 100.0 / self.executable as f64
        }
    }

    /// Plain-text rendering
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "executed: {} / {} executable lines ({:.1}%)",
            self.executed,
            self.executable,
            self.percent()
        );
        let _ = writeln!(out, "not executed: {}", self.not_executed);
        if let Some(lines) = &self.executed_lines {
            let listed: Vec<String> = lines.iter().map(u32::to_string).collect();
            let _ = writeln!(out, "lines: {}", listed.join(" "));
        }
        out
    }
}

/// Count a parsed report
#[must_use]
pub fn summarize_report(report: &GcovReport, list_lines: bool) -> GcovSummary {
    let executed = report.executed_lines();
    GcovSummary {
        executed: executed.len(),
        executable: report.executable_lines().len(),
        not_executed: report.not_executed_lines().len(),
        executed_lines: list_lines.then(|| executed.into_iter().collect()),
    }
}

/// Execute the gcov command
pub fn execute_gcov(_config: &CliConfig, args: &GcovArgs) -> CliResult<()> {
    let report = GcovReport::from_file(&args.report)?;
    let summary = summarize_report(&report, args.lines);
    match OutputFormat::from(args.format) {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => print!("{}", summary.to_text()),
    }
    Ok(())
}
