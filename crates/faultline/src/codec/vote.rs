//! Vote: the controller's response for one iteration.

use super::layout::{vote as offset, Reader, Writer, VOTE_SIZE};
use super::point::TrajectoryPoint;
use super::CodecError;
use crate::result::FaultlineResult;
use serde::Serialize;
use std::path::Path;

/// Decoded controller response
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Vote {
    pub sequence_index: i32,
    pub point: TrajectoryPoint,
}

/// Decode a vote from the first `VOTE_SIZE` bytes of `buf`.
///
/// The four bytes after the index are alignment padding and are skipped.
pub fn decode_vote(buf: &[u8]) -> Result<Vote, CodecError> {
    let reader = Reader::new(buf, "Vote", VOTE_SIZE)?;
    Ok(Vote {
        sequence_index: reader.i32(offset::INDEX)?,
        point: TrajectoryPoint::decode_from(&reader.at(offset::POINT)?)?,
    })
}

/// Encode a vote into a fresh `VOTE_SIZE` buffer with a zeroed pad
#[must_use]
pub fn encode_vote(vote: &Vote) -> Vec<u8> {
    let mut buf = vec![0u8; VOTE_SIZE];
    let mut writer = Writer::new(&mut buf);
    writer.i32(offset::INDEX, vote.sequence_index);
    vote.point.encode_with(&mut writer.at(offset::POINT));
    buf
}

/// Read and decode a vote file
pub fn read_vote_file(path: &Path) -> FaultlineResult<Vote> {
    let bytes = std::fs::read(path)?;
    Ok(decode_vote(&bytes)?)
}
