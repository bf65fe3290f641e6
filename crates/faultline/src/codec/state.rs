//! State: the request payload handed to the controller each iteration.
//!
//! The runner forwards raw input bytes untouched; decoding is only needed
//! for human-readable dumps of a failing input.

use super::layout::{
    state as offset, Reader, Writer, JOINT_NAME_LEN, MAX_JOINTS, MAX_POINTS, POINT_SIZE,
    STATE_MIN_SIZE,
};
use super::point::TrajectoryPoint;
use super::CodecError;
use crate::result::FaultlineResult;
use serde::Serialize;
use std::path::Path;

/// A length field whose declared value exceeded its physical capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LengthOverflow {
    pub field: &'static str,
    pub declared: u64,
    pub capacity: usize,
}

/// Decoded controller request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct State {
    pub sequence_index: i32,
    pub current_time_seconds: i32,
    joint_names_length: u64,
    joint_names: Vec<String>,
    points_length: u64,
    points: Vec<TrajectoryPoint>,
}

impl State {
    /// Build a state from logical contents; lists longer than capacity are cut.
    #[must_use]
    pub fn new(
        sequence_index: i32,
        current_time_seconds: i32,
        joint_names: Vec<String>,
        points: Vec<TrajectoryPoint>,
    ) -> Self {
        let mut joint_names = joint_names;
        joint_names.truncate(MAX_JOINTS);
        let mut points = points;
        points.truncate(MAX_POINTS);
        Self {
            sequence_index,
            current_time_seconds,
            joint_names_length: joint_names.len() as u64,
            joint_names,
            points_length: points.len() as u64,
            points,
        }
    }

    /// Joint names in the logically valid slots
    #[must_use]
    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    /// Trajectory points in the logically valid slots
    #[must_use]
    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    #[must_use]
    pub const fn declared_joint_names_length(&self) -> u64 {
        self.joint_names_length
    }

    #[must_use]
    pub const fn declared_points_length(&self) -> u64 {
        self.points_length
    }

    /// Every length field that was clamped during decoding
    #[must_use]
    pub fn overflows(&self) -> Vec<LengthOverflow> {
        let mut out = Vec::new();
        if self.joint_names_length > MAX_JOINTS as u64 {
            out.push(LengthOverflow {
                field: "joint_names_length",
                declared: self.joint_names_length,
                capacity: MAX_JOINTS,
            });
        }
        if self.points_length > MAX_POINTS as u64 {
            out.push(LengthOverflow {
                field: "points_length",
                declared: self.points_length,
                capacity: MAX_POINTS,
            });
        }
        for point in &self.points {
            for (field, array) in [
                ("positions_length", &point.positions),
                ("velocities_length", &point.velocities),
                ("accelerations_length", &point.accelerations),
                ("effort_length", &point.effort),
            ] {
                if array.is_clamped() {
                    out.push(LengthOverflow {
                        field,
                        declared: array.declared_len(),
                        capacity: array.slots().len(),
                    });
                }
            }
        }
        out
    }

    #[must_use]
    pub fn is_clamped(&self) -> bool {
        !self.overflows().is_empty()
    }
}

fn clamp(declared: u64, capacity: usize) -> usize {
    usize::try_from(declared).map_or(capacity, |n| n.min(capacity))
}

fn decode_joint_name(slot: &[u8]) -> String {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    slot[..end]
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
        .collect()
}

/// Decode a state from a buffer of at least `STATE_MIN_SIZE` bytes.
///
/// Declared lengths above capacity are clamped, not rejected; the original
/// values stay visible through [`State::overflows`]. Only the valid prefix
/// of names and points is decoded, and empty name slots are skipped.
pub fn decode_state(buf: &[u8]) -> Result<State, CodecError> {
    let reader = Reader::new(buf, "State", STATE_MIN_SIZE)?;

    let joint_names_length = reader.u64(offset::JOINT_NAMES_LENGTH)?;
    let joint_names = (0..clamp(joint_names_length, MAX_JOINTS))
        .map(|i| {
            reader
                .bytes(offset::JOINT_NAMES + i * JOINT_NAME_LEN, JOINT_NAME_LEN)
                .map(decode_joint_name)
        })
        .filter(|name| !matches!(name, Ok(name) if name.is_empty()))
        .collect::<Result<Vec<_>, _>>()?;

    let points_length = reader.u64(offset::POINTS_LENGTH)?;
    let points = (0..clamp(points_length, MAX_POINTS))
        .map(|i| TrajectoryPoint::decode_from(&reader.at(offset::POINTS + i * POINT_SIZE)?))
        .collect::<Result<Vec<_>, _>>()?;

    let state = State {
        sequence_index: reader.i32(offset::INDEX)?,
        current_time_seconds: reader.i32(offset::CURRENT_TIME)?,
        joint_names_length,
        joint_names,
        points_length,
        points,
    };
    for overflow in state.overflows() {
        tracing::warn!(
            field = overflow.field,
            declared = overflow.declared,
            capacity = overflow.capacity,
            "state length field exceeds capacity, clamping"
        );
    }
    Ok(state)
}

/// Encode a state into a fresh `STATE_MIN_SIZE` buffer.
///
/// Unused name slots and point slots are zero-filled. Names longer than a
/// slot are cut so the NUL terminator always fits.
#[must_use]
pub fn encode_state(state: &State) -> Vec<u8> {
    let mut buf = vec![0u8; STATE_MIN_SIZE];
    let mut writer = Writer::new(&mut buf);
    writer.i32(offset::INDEX, state.sequence_index);
    writer.u64(offset::JOINT_NAMES_LENGTH, state.joint_names_length);
    for (i, name) in state.joint_names.iter().enumerate() {
        let bytes = name.as_bytes();
        let len = bytes.len().min(JOINT_NAME_LEN - 1);
        writer.bytes(offset::JOINT_NAMES + i * JOINT_NAME_LEN, &bytes[..len]);
    }
    writer.u64(offset::POINTS_LENGTH, state.points_length);
    for (i, point) in state.points.iter().enumerate() {
        point.encode_with(&mut writer.at(offset::POINTS + i * POINT_SIZE));
    }
    writer.i32(offset::CURRENT_TIME, state.current_time_seconds);
    buf
}

/// Copy raw input bytes into an IPC buffer of `buffer_len` bytes.
///
/// The payload is forwarded unparsed. Bytes past the payload are zero so the
/// controller never reads leftovers from a previous iteration.
pub fn encode_state_passthrough(raw: &[u8], buffer_len: usize) -> Result<Vec<u8>, CodecError> {
    if raw.len() > buffer_len {
        return Err(CodecError::PayloadTooLarge {
            size: raw.len(),
            capacity: buffer_len,
        });
    }
    let mut buf = vec![0u8; buffer_len];
    buf[..raw.len()].copy_from_slice(raw);
    Ok(buf)
}

/// Read and decode a state file
pub fn read_state_file(path: &Path) -> FaultlineResult<State> {
    let bytes = std::fs::read(path)?;
    Ok(decode_state(&bytes)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::codec::point::BoundedArray;

    fn sample_state() -> State {
        let points = (0..3)
            .map(|i| TrajectoryPoint {
                positions: BoundedArray::from_values(&[f64::from(i); 6]),
                velocities: BoundedArray::from_values(&[0.5; 6]),
                time_from_start_sec: i,
                ..TrajectoryPoint::default()
            })
            .collect();
        State::new(
            42,
            1_700_000_000,
            vec!["shoulder_pan".into(), "elbow".into()],
            points,
        )
    }

    mod layout {
        use super::*;

        #[test]
        fn test_encoded_offsets() {
            let bytes = encode_state(&sample_state());
            assert_eq!(bytes.len(), STATE_MIN_SIZE);
            assert_eq!(&bytes[0..4], &42i32.to_le_bytes());
            assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
            assert_eq!(&bytes[8..16], &2u64.to_le_bytes());
            assert_eq!(&bytes[16..28], b"shoulder_pan");
            assert_eq!(bytes[28], 0);
            assert_eq!(&bytes[272..277], b"elbow");
            assert_eq!(&bytes[2576..2584], &3u64.to_le_bytes());
            assert_eq!(&bytes[2584..2592], &6u64.to_le_bytes());
            assert_eq!(&bytes[832_024..832_028], &1_700_000_000i32.to_le_bytes());
        }

        #[test]
        fn test_decode_captured_file_length() {
            let mut bytes = encode_state(&sample_state());
            bytes.resize(832_033, 0xEE);
            let state = decode_state(&bytes).unwrap();
            assert_eq!(state.sequence_index, 42);
            assert_eq!(state.current_time_seconds, 1_700_000_000);
        }

        #[test]
        fn test_decode_short_buffer() {
            let bytes = vec![0u8; STATE_MIN_SIZE - 1];
            assert!(matches!(
                decode_state(&bytes),
                Err(CodecError::BufferTooShort {
                    structure: "State",
                    required: 832_028,
                    actual: 832_027
                })
            ));
        }
    }

    mod contents {
        use super::*;

        #[test]
        fn test_decode_recovers_state() {
            let state = sample_state();
            let decoded = decode_state(&encode_state(&state)).unwrap();
            assert_eq!(decoded, state);
            assert_eq!(decoded.joint_names(), &["shoulder_pan", "elbow"]);
            assert_eq!(decoded.points().len(), 3);
            assert_eq!(decoded.points()[2].positions.values(), &[2.0; 6]);
            assert!(!decoded.is_clamped());
        }

        #[test]
        fn test_padding_points_not_consumed() {
            let mut bytes = encode_state(&sample_state());
            // garbage in point slot 3 must stay invisible
            let slot = offset::POINTS + 3 * POINT_SIZE;
            bytes[slot..slot + 8].copy_from_slice(&u64::MAX.to_le_bytes());
            let decoded = decode_state(&bytes).unwrap();
            assert_eq!(decoded.points().len(), 3);
            assert!(!decoded.is_clamped());
        }

        #[test]
        fn test_points_length_clamped() {
            let mut bytes = encode_state(&sample_state());
            bytes[2576..2584].copy_from_slice(&1000u64.to_le_bytes());
            let decoded = decode_state(&bytes).unwrap();
            assert_eq!(decoded.points().len(), MAX_POINTS);
            assert_eq!(decoded.declared_points_length(), 1000);
            assert_eq!(
                decoded.overflows(),
                vec![LengthOverflow {
                    field: "points_length",
                    declared: 1000,
                    capacity: 256
                }]
            );
        }

        #[test]
        fn test_joint_names_clamped_and_non_ascii_replaced() {
            let mut bytes = encode_state(&sample_state());
            bytes[8..16].copy_from_slice(&64u64.to_le_bytes());
            bytes[16] = 0xC3;
            let decoded = decode_state(&bytes).unwrap();
            // slots 2..10 are empty and dropped
            assert_eq!(decoded.joint_names().len(), 2);
            assert!(decoded.joint_names()[0].starts_with('\u{FFFD}'));
            assert_eq!(decoded.joint_names()[1], "elbow");
            assert_eq!(decoded.declared_joint_names_length(), 64);
            assert!(decoded.is_clamped());
        }

        #[test]
        fn test_empty_joint_name_slots_skipped() {
            let names = vec!["a".to_string(), String::new(), "b".to_string()];
            let decoded = decode_state(&encode_state(&State::new(0, 0, names, Vec::new()))).unwrap();
            assert_eq!(decoded.joint_names(), &["a", "b"]);
            assert_eq!(decoded.declared_joint_names_length(), 3);
            assert!(crate::codec::format_state_text(&decoded).contains("joint_names: a, b"));
        }

        #[test]
        fn test_new_truncates_to_capacity() {
            let names = (0..12).map(|i| format!("j{i}")).collect();
            let state = State::new(0, 0, names, Vec::new());
            assert_eq!(state.joint_names().len(), MAX_JOINTS);
            assert_eq!(state.declared_joint_names_length(), 10);
        }

        #[test]
        fn test_long_joint_name_keeps_terminator() {
            let state = State::new(0, 0, vec!["x".repeat(400)], Vec::new());
            let bytes = encode_state(&state);
            assert_eq!(bytes[16 + 255], 0);
            let decoded = decode_state(&bytes).unwrap();
            assert_eq!(decoded.joint_names()[0].len(), 255);
        }
    }

    mod passthrough {
        use super::*;

        #[test]
        fn test_payload_copied_and_tail_zeroed() {
            let buf = encode_state_passthrough(&[1, 2, 3], 6).unwrap();
            assert_eq!(buf, vec![1, 2, 3, 0, 0, 0]);
        }

        #[test]
        fn test_exact_fit() {
            let raw = vec![7u8; 832_033];
            assert_eq!(encode_state_passthrough(&raw, 832_033).unwrap(), raw);
        }

        #[test]
        fn test_payload_too_large() {
            assert_eq!(
                encode_state_passthrough(&[0; 10], 4),
                Err(CodecError::PayloadTooLarge {
                    size: 10,
                    capacity: 4
                })
            );
        }
    }
}
