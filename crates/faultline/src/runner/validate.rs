//! Oracle comparison for one iteration.

use crate::codec::Vote;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict of comparing a controller vote with its oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    /// Cosine distance, absent when the indices already disagreed
    pub distance: Option<f64>,
    pub reason: String,
}

impl Verdict {
    fn pass(distance: f64) -> Self {
        Self {
            passed: true,
            distance: Some(distance),
            reason: format!("PASS (distance={distance:.4})"),
        }
    }

    fn fail(distance: Option<f64>, reason: String) -> Self {
        Self {
            passed: false,
            distance,
            reason,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// `1 - cosine_similarity(a, b)`, in `[0, 2]`.
///
/// Two zero vectors are identical (0); one zero vector against a non-zero
/// one is maximally dissimilar (1). Similarity is clamped to `[-1, 1]`.
#[must_use]
pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 && norm_b == 0.0 {
        return 0.0;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    let similarity = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    1.0 - similarity
}

/// First `joints` positions followed by first `joints` velocities
#[must_use]
pub fn comparison_vector(vote: &Vote, joints: usize) -> Vec<f64> {
    let mut vector = Vec::with_capacity(joints * 2);
    vector.extend_from_slice(vote.point.positions.prefix(joints));
    vector.extend_from_slice(vote.point.velocities.prefix(joints));
    vector
}

/// Compare a controller vote against the oracle.
///
/// Indices must match exactly before distances are considered.
#[must_use]
pub fn validate_iteration(controller: &Vote, oracle: &Vote, epsilon: f64, joints: usize) -> Verdict {
    if controller.sequence_index != oracle.sequence_index {
        return Verdict::fail(
            None,
            format!(
                "FAIL: index mismatch ({} != {})",
                controller.sequence_index, oracle.sequence_index
            ),
        );
    }

    let distance = cosine_distance(
        &comparison_vector(controller, joints),
        &comparison_vector(oracle, joints),
    );
    // NaN inputs give a NaN distance, which must not pass
    if distance <= epsilon {
        Verdict::pass(distance)
    } else {
        Verdict::fail(
            Some(distance),
            format!("FAIL: cosine_distance={distance:.4} > {epsilon}"),
        )
    }
}
