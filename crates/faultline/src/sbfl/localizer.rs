//! Ranking lines by suspiciousness.

use super::matrix::CoverageMatrix;
use super::metric::Metric;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Suspiciousness of one source line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuspiciousnessScore {
    pub line: u32,
    #[serde(serialize_with = "serialize_score")]
    pub score: f64,
    pub ef: usize,
    pub ep: usize,
    pub nf: usize,
    pub np: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
}

/// JSON has no infinity; unbounded scores are written as the string "inf".
fn serialize_score<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if score.is_infinite() {
        serializer.serialize_str(if *score > 0.0 { "inf" } else { "-inf" })
    } else {
        serializer.serialize_f64(*score)
    }
}

/// Descending score, then ascending line
fn rank_order(a: &SuspiciousnessScore, b: &SuspiciousnessScore) -> Ordering {
    b.score.total_cmp(&a.score).then(a.line.cmp(&b.line))
}

/// Scores lines of a coverage matrix with a single metric
#[derive(Debug)]
pub struct SbflLocalizer<'a> {
    matrix: &'a CoverageMatrix,
    metric: Metric,
    source_lines: Option<&'a BTreeMap<u32, String>>,
}

impl<'a> SbflLocalizer<'a> {
    #[must_use]
    pub fn new(matrix: &'a CoverageMatrix, metric: Metric) -> Self {
        Self {
            matrix,
            metric,
            source_lines: None,
        }
    }

    /// Attach source text to every produced score
    #[must_use]
    pub fn with_source_lines(mut self, source_lines: &'a BTreeMap<u32, String>) -> Self {
        self.source_lines = Some(source_lines);
        self
    }

    #[must_use]
    pub const fn metric(&self) -> Metric {
        self.metric
    }

    /// Score a single line
    #[must_use]
    pub fn score_line(&self, line: u32) -> SuspiciousnessScore {
        let spectrum = self.matrix.spectrum(line);
        SuspiciousnessScore {
            line,
            score: self.metric.score(&spectrum),
            ef: spectrum.ef,
            ep: spectrum.ep,
            nf: spectrum.nf,
            np: spectrum.np,
            source_text: self
                .source_lines
                .and_then(|sources| sources.get(&line).cloned()),
        }
    }

    /// Score every covered line, most suspicious first.
    ///
    /// Equal scores are ordered by line number, so the ranking is identical
    /// across runs for the same matrix.
    #[must_use]
    pub fn rank_lines(&self, top_n: Option<usize>) -> Vec<SuspiciousnessScore> {
        let mut scores: Vec<_> = self
            .matrix
            .all_lines()
            .into_iter()
            .map(|line| self.score_line(line))
            .collect();
        scores.sort_by(rank_order);
        if let Some(n) = top_n {
            scores.truncate(n);
        }
        tracing::debug!(
            metric = %self.metric,
            lines = scores.len(),
            failing = self.matrix.num_failing(),
            passing = self.matrix.num_passing(),
            "ranked lines"
        );
        scores
    }

    /// Ranked lines whose score is at least `threshold`
    #[must_use]
    pub fn suspicious_lines(&self, threshold: f64, top_n: Option<usize>) -> Vec<SuspiciousnessScore> {
        let mut scores: Vec<_> = self
            .rank_lines(None)
            .into_iter()
            .filter(|s| s.score >= threshold)
            .collect();
        if let Some(n) = top_n {
            scores.truncate(n);
        }
        scores
    }
}

fn format_score(score: f64) -> String {
    if score.is_infinite() {
        "inf".to_string()
    } else {
        format!("{score:.4}")
    }
}

/// Render a ranking as a fixed-width table
#[must_use]
pub fn format_ranking(metric: Metric, scores: &[SuspiciousnessScore]) -> String {
    let mut output = String::new();
    output.push_str(&format!("Suspiciousness ranking ({metric})\n"));
    output.push_str("  Rank |  Line |    Score | ef | ep | nf | np | Source\n");
    output.push_str("  -----|-------|----------|----|----|----|----|-------\n");
    for (rank, s) in scores.iter().enumerate() {
        output.push_str(&format!(
            "  {:4} | {:5} | {:>8} | {:2} | {:2} | {:2} | {:2} | {}\n",
            rank + 1,
            s.line,
            format_score(s.score),
            s.ef,
            s.ep,
            s.nf,
            s.np,
            s.source_text.as_deref().map_or("", str::trim)
        ));
    }
    output
}
