//! Human-readable dumps of decoded protocol values.

use super::point::{BoundedArray, TrajectoryPoint};
use super::state::State;
use super::vote::Vote;
use std::fmt::Write;

/// Points beyond this count are summarized instead of listed
const MAX_LISTED_POINTS: usize = 8;

fn format_array(array: &BoundedArray) -> String {
    let values: Vec<String> = array.values().iter().map(|v| format!("{v:.6}")).collect();
    if array.is_clamped() {
        format!(
            "[{}] (declared {}, clamped)",
            values.join(", "),
            array.declared_len()
        )
    } else {
        format!("[{}]", values.join(", "))
    }
}

fn format_point(out: &mut String, indent: &str, point: &TrajectoryPoint) {
    let _ = writeln!(
        out,
        "{indent}time_from_start: {}s {}ns",
        point.time_from_start_sec, point.time_from_start_nsec
    );
    let _ = writeln!(out, "{indent}positions:     {}", format_array(&point.positions));
    let _ = writeln!(out, "{indent}velocities:    {}", format_array(&point.velocities));
    if !point.accelerations.is_empty() {
        let _ = writeln!(
            out,
            "{indent}accelerations: {}",
            format_array(&point.accelerations)
        );
    }
    if !point.effort.is_empty() {
        let _ = writeln!(out, "{indent}effort:        {}", format_array(&point.effort));
    }
}

/// Render a state for inclusion in a repair prompt or a terminal
#[must_use]
pub fn format_state_text(state: &State) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "State");
    let _ = writeln!(out, "  index: {}", state.sequence_index);
    let _ = writeln!(out, "  current_time_seconds: {}", state.current_time_seconds);
    let _ = writeln!(out, "  joint_names: {}", state.joint_names().join(", "));

    let points = state.points();
    let _ = writeln!(out, "  points: {}", points.len());
    for (i, point) in points.iter().take(MAX_LISTED_POINTS).enumerate() {
        let _ = writeln!(out, "  [{i}]");
        format_point(&mut out, "    ", point);
    }
    if points.len() > MAX_LISTED_POINTS {
        let _ = writeln!(
            out,
            "  ... {} more points",
            points.len() - MAX_LISTED_POINTS
        );
    }
    for overflow in state.overflows() {
        let _ = writeln!(
            out,
            "  warning: {} declared {} exceeds capacity {}",
            overflow.field, overflow.declared, overflow.capacity
        );
    }
    out
}

/// Render a vote
#[must_use]
pub fn format_vote_text(vote: &Vote) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Vote");
    let _ = writeln!(out, "  index: {}", vote.sequence_index);
    format_point(&mut out, "  ", &vote.point);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_text_lists_valid_points() {
        let point = TrajectoryPoint {
            positions: BoundedArray::from_values(&[1.0, 2.0]),
            ..TrajectoryPoint::default()
        };
        let state = State::new(7, 99, vec!["a".into(), "b".into()], vec![point]);
        let text = format_state_text(&state);
        assert!(text.contains("index: 7"));
        assert!(text.contains("current_time_seconds: 99"));
        assert!(text.contains("joint_names: a, b"));
        assert!(text.contains("points: 1"));
        assert!(text.contains("[1.000000, 2.000000]"));
        assert!(!text.contains("accelerations"));
        assert!(!text.contains("warning"));
    }

    #[test]
    fn test_state_text_summarizes_long_trajectories() {
        let points = vec![TrajectoryPoint::default(); 20];
        let text = format_state_text(&State::new(0, 0, Vec::new(), points));
        assert!(text.contains("points: 20"));
        assert!(text.contains("... 12 more points"));
        assert!(!text.contains("[8]"));
    }

    #[test]
    fn test_vote_text() {
        let vote = Vote {
            sequence_index: 3,
            point: TrajectoryPoint {
                velocities: BoundedArray::from_values(&[0.25]),
                effort: BoundedArray::from_values(&[4.0]),
                ..TrajectoryPoint::default()
            },
        };
        let text = format_vote_text(&vote);
        assert!(text.starts_with("Vote\n  index: 3"));
        assert!(text.contains("velocities:    [0.250000]"));
        assert!(text.contains("effort:        [4.000000]"));
    }
}
