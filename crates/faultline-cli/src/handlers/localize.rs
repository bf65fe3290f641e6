//! Localize command handler

use super::{print_json, reporter_for, Workdir};
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::OutputFormat;
use crate::LocalizeArgs;
use faultline::session::Phase;
use faultline::{
    format_ranking, LocalizationReport, Session, SessionConfig, SessionEvent, SessionSources,
};
use std::fmt::Write as _;
use std::time::Duration;

/// Execute the localize command
pub fn execute_localize(config: &CliConfig, args: &LocalizeArgs) -> CliResult<()> {
    let session_config = localize_session_config(&config.session, args);
    let workdir = Workdir::resolve(args.workdir.as_deref(), args.keep_workdir)?;
    let sources = SessionSources {
        source: args.source.clone(),
        header: args.header.clone(),
        driver: args.driver.clone(),
        coverage_driver: args.coverage_driver.clone(),
    };
    let session = Session::prepare(&sources, &args.test_dir, workdir.path(), session_config)?;

    let mut reporter = reporter_for(config);
    let total = session.test_cases().len() as u64;
    let verbose = config.verbosity.is_verbose();

    let report = session.localize_with(|event| match event {
        SessionEvent::Phase(phase) => {
            reporter.finish();
            reporter.info(&phase.to_string());
            if matches!(phase, Phase::CoverageCollection | Phase::Validation) {
                reporter.start_progress(total, &phase.to_string());
            }
        }
        SessionEvent::Coverage(record) => {
            reporter.increment(1);
            reporter.set_message(&record.name);
            if !record.runner_exit.is_complete() {
                reporter.warning(&format!(
                    "{}: coverage runner {}; partial coverage kept",
                    record.name, record.runner_exit
                ));
            } else if verbose {
                reporter.info(&format!(
                    "{}: {} lines covered",
                    record.name,
                    record.covered_lines.len()
                ));
            }
        }
        SessionEvent::TestCase(result) => {
            reporter.increment(1);
            reporter.set_message(&result.name);
            if result.passed() {
                reporter.success(&result.to_string());
            } else {
                reporter.failure(&result.to_string());
            }
        }
    })?;
    reporter.finish();

    let duration: Duration = report.results.iter().map(|r| r.duration).sum();
    reporter.summary(report.passing.len(), report.failing.len(), duration);

    match OutputFormat::from(args.format) {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print!("{}", render_report(&report)),
    }

    if workdir.is_temporary() {
        tracing::debug!(workdir = %workdir.path().display(), "removing workdir");
    } else {
        reporter.info(&format!("workdir kept at {}", workdir.path().display()));
    }
    Ok(())
}

/// Apply command-line overrides on top of file/default settings
#[must_use]
pub fn localize_session_config(base: &SessionConfig, args: &LocalizeArgs) -> SessionConfig {
    let mut config = base.clone();
    if let Some(metric) = args.metric {
        config.metric = metric;
    }
    if args.all {
        config.top_n = None;
    } else if let Some(top) = args.top {
        config.top_n = Some(top);
    }
    if let Some(epsilon) = args.epsilon {
        config.runner = config.runner.with_epsilon(epsilon);
    }
    if args.asan {
        config.toolchain = config.toolchain.with_sanitizer(true);
    }
    if let Some(limit) = args.iteration_limit {
        config.coverage = config.coverage.with_iteration_limit(limit);
    }
    config
}

/// Plain-text rendering of a localization report
#[must_use]
pub fn render_report(report: &LocalizationReport) -> String {
    let mut out = String::new();
    if report.all_passed() {
        let _ = writeln!(
            out,
            "All {} test cases passed; nothing to localize.",
            report.results.len()
        );
        return out;
    }
    let _ = writeln!(out, "Failing test cases: {}", report.failing.join(", "));
    if report.ranking.is_empty() {
        let _ = writeln!(out, "No covered lines to rank.");
    } else {
        out.push_str(&format_ranking(report.metric, &report.ranking));
    }
    out
}
