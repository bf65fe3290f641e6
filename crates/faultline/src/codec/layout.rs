//! Byte layout of the controller protocol structures.
//!
//! Every offset the codec touches is listed here. Nothing is derived from
//! Rust struct layout; the controller side is compiled C/C++ with 8-byte
//! alignment for `u64`/`f64` fields, and the pads below mirror that.
//!
//! ```text
//! TrajectoryPoint (3240 bytes)
//!   0     u64  positions_length        8     f64[100] positions
//!   808   u64  velocities_length       816   f64[100] velocities
//!   1616  u64  accelerations_length    1624  f64[100] accelerations
//!   2424  u64  effort_length           2432  f64[100] effort
//!   3232  i32  time_from_start_sec     3236  u32 time_from_start_nsec
//!
//! Vote (3248 bytes)
//!   0     i32  idx                     4     pad[4]
//!   8     TrajectoryPoint
//!
//! State (>= 832028 bytes)
//!   0     i32  idx                     4     pad[4]
//!   8     u64  joint_names_length      16    char[10][256] joint_names
//!   2576  u64  points_length           2584  TrajectoryPoint[256]
//!   832024 i32 cur_time_seconds
//! ```

use super::CodecError;

/// Capacity of each numeric array in a trajectory point
pub const MAX_ARRAY_LEN: usize = 100;

/// Number of joint-name slots in a state
pub const MAX_JOINTS: usize = 10;

/// Width of one joint-name slot, NUL terminator included
pub const JOINT_NAME_LEN: usize = 256;

/// Number of trajectory point slots in a state
pub const MAX_POINTS: usize = 256;

/// One `(u64 length, f64[100])` block
pub const ARRAY_BLOCK_SIZE: usize = 8 + MAX_ARRAY_LEN * 8;

/// Encoded size of a trajectory point
pub const POINT_SIZE: usize = 4 * ARRAY_BLOCK_SIZE + 4 + 4;

/// Offsets inside a trajectory point
pub mod point {
    use super::ARRAY_BLOCK_SIZE;

    pub const POSITIONS: usize = 0;
    pub const VELOCITIES: usize = ARRAY_BLOCK_SIZE;
    pub const ACCELERATIONS: usize = 2 * ARRAY_BLOCK_SIZE;
    pub const EFFORT: usize = 3 * ARRAY_BLOCK_SIZE;
    pub const TIME_SEC: usize = 4 * ARRAY_BLOCK_SIZE;
    pub const TIME_NSEC: usize = TIME_SEC + 4;
}

/// Offsets inside a vote
pub mod vote {
    pub const INDEX: usize = 0;
    pub const POINT: usize = 8;
}

/// Offsets inside a state
pub mod state {
    use super::{JOINT_NAME_LEN, MAX_JOINTS, MAX_POINTS, POINT_SIZE};

    pub const INDEX: usize = 0;
    pub const JOINT_NAMES_LENGTH: usize = 8;
    pub const JOINT_NAMES: usize = 16;
    pub const POINTS_LENGTH: usize = JOINT_NAMES + MAX_JOINTS * JOINT_NAME_LEN;
    pub const POINTS: usize = POINTS_LENGTH + 8;
    pub const CURRENT_TIME: usize = POINTS + MAX_POINTS * POINT_SIZE;
}

/// Encoded size of a vote
pub const VOTE_SIZE: usize = vote::POINT + POINT_SIZE;

/// Smallest buffer that holds every state field.
///
/// Captured input files are longer (trailing alignment and padding bytes
/// written by the producer); the decoder ignores anything past this point.
pub const STATE_MIN_SIZE: usize = state::CURRENT_TIME + 4;

const _: () = assert!(POINT_SIZE == 3240);
const _: () = assert!(VOTE_SIZE == 3248);
const _: () = assert!(state::POINTS_LENGTH == 2576);
const _: () = assert!(state::CURRENT_TIME == 832_024);
const _: () = assert!(STATE_MIN_SIZE == 832_028);

/// Bounds-checked little-endian reads over a borrowed buffer
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    structure: &'static str,
}

impl<'a> Reader<'a> {
    /// Wrap `buf`, failing up front if it cannot hold `required` bytes
    pub(crate) fn new(
        buf: &'a [u8],
        structure: &'static str,
        required: usize,
    ) -> Result<Self, CodecError> {
        if buf.len() < required {
            return Err(CodecError::BufferTooShort {
                structure,
                required,
                actual: buf.len(),
            });
        }
        Ok(Self { buf, structure })
    }

    pub(crate) fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], CodecError> {
        self.buf
            .get(offset..offset + len)
            .ok_or(CodecError::BufferTooShort {
                structure: self.structure,
                required: offset + len,
                actual: self.buf.len(),
            })
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(offset, N)?);
        Ok(out)
    }

    pub(crate) fn i32(&self, offset: usize) -> Result<i32, CodecError> {
        self.array(offset).map(i32::from_le_bytes)
    }

    pub(crate) fn u32(&self, offset: usize) -> Result<u32, CodecError> {
        self.array(offset).map(u32::from_le_bytes)
    }

    pub(crate) fn u64(&self, offset: usize) -> Result<u64, CodecError> {
        self.array(offset).map(u64::from_le_bytes)
    }

    pub(crate) fn f64(&self, offset: usize) -> Result<f64, CodecError> {
        self.array(offset).map(f64::from_le_bytes)
    }

    /// Re-base the reader at `offset` for a nested structure
    pub(crate) fn at(&self, offset: usize) -> Result<Self, CodecError> {
        let rest = self.buf.get(offset..).ok_or(CodecError::BufferTooShort {
            structure: self.structure,
            required: offset,
            actual: self.buf.len(),
        })?;
        Ok(Self {
            buf: rest,
            structure: self.structure,
        })
    }
}

/// Little-endian writes into a preallocated buffer.
///
/// Callers size the buffer from the layout constants, so every offset is in
/// range by construction.
#[derive(Debug)]
pub(crate) struct Writer<'a> {
    buf: &'a mut [u8],
}

impl<'a> Writer<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    pub(crate) fn bytes(&mut self, offset: usize, data: &[u8]) {
        self.buf[offset..offset + data.len()].copy_from_slice(data);
    }

    pub(crate) fn i32(&mut self, offset: usize, value: i32) {
        self.bytes(offset, &value.to_le_bytes());
    }

    pub(crate) fn u32(&mut self, offset: usize, value: u32) {
        self.bytes(offset, &value.to_le_bytes());
    }

    pub(crate) fn u64(&mut self, offset: usize, value: u64) {
        self.bytes(offset, &value.to_le_bytes());
    }

    pub(crate) fn f64(&mut self, offset: usize, value: f64) {
        self.bytes(offset, &value.to_le_bytes());
    }

    pub(crate) fn at(&mut self, offset: usize) -> Writer<'_> {
        Writer {
            buf: &mut self.buf[offset..],
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_point_offsets() {
        assert_eq!(point::POSITIONS, 0);
        assert_eq!(point::VELOCITIES, 808);
        assert_eq!(point::ACCELERATIONS, 1616);
        assert_eq!(point::EFFORT, 2424);
        assert_eq!(point::TIME_SEC, 3232);
        assert_eq!(point::TIME_NSEC, 3236);
    }

    #[test]
    fn test_state_offsets() {
        assert_eq!(state::JOINT_NAMES, 16);
        assert_eq!(state::POINTS, 2584);
        assert_eq!(state::CURRENT_TIME, 2584 + 256 * 3240);
    }

    #[test]
    fn test_reader_rejects_short_buffer() {
        let buf = [0u8; 4];
        let err = Reader::new(&buf, "Vote", VOTE_SIZE).unwrap_err();
        assert_eq!(
            err,
            CodecError::BufferTooShort {
                structure: "Vote",
                required: VOTE_SIZE,
                actual: 4
            }
        );
    }

    #[test]
    fn test_reader_little_endian() {
        let mut buf = vec![0u8; 24];
        buf[0..4].copy_from_slice(&(-7i32).to_le_bytes());
        buf[8..16].copy_from_slice(&42u64.to_le_bytes());
        buf[16..24].copy_from_slice(&1.5f64.to_le_bytes());
        let reader = Reader::new(&buf, "test", 24).unwrap();
        assert_eq!(reader.i32(0).unwrap(), -7);
        assert_eq!(reader.u64(8).unwrap(), 42);
        assert_eq!(reader.f64(16).unwrap(), 1.5);
        assert!(reader.u64(20).is_err());
    }

    #[test]
    fn test_writer_nested_offsets() {
        let mut buf = vec![0u8; 16];
        let mut writer = Writer::new(&mut buf);
        writer.at(8).u32(0, 0xDEAD_BEEF);
        assert_eq!(&buf[8..12], &0xDEAD_BEEFu32.to_le_bytes());
    }
}
