//! Trajectory point: four length-prefixed numeric arrays plus a timestamp.

use super::layout::{point, Reader, Writer, MAX_ARRAY_LEN, POINT_SIZE};
use super::CodecError;
use serde::{Serialize, Serializer};

/// A fixed-capacity array of 100 doubles with a declared logical length.
///
/// All 100 slots are kept so the encoded form round-trips bit for bit, but
/// only the first `min(declared_len, 100)` are exposed as values.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedArray {
    declared_len: u64,
    slots: Vec<f64>,
}

impl BoundedArray {
    /// Build from logical values; anything past capacity is dropped.
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        let mut slots = vec![0.0; MAX_ARRAY_LEN];
        let len = values.len().min(MAX_ARRAY_LEN);
        slots[..len].copy_from_slice(&values[..len]);
        Self {
            declared_len: len as u64,
            slots,
        }
    }

    fn decode(reader: &Reader<'_>, offset: usize) -> Result<Self, CodecError> {
        let declared_len = reader.u64(offset)?;
        let slots = (0..MAX_ARRAY_LEN)
            .map(|i| reader.f64(offset + 8 + i * 8))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            declared_len,
            slots,
        })
    }

    fn encode(&self, writer: &mut Writer<'_>, offset: usize) {
        writer.u64(offset, self.declared_len);
        for (i, value) in self.slots.iter().enumerate() {
            writer.f64(offset + 8 + i * 8, *value);
        }
    }

    /// Length field exactly as stored
    #[must_use]
    pub const fn declared_len(&self) -> u64 {
        self.declared_len
    }

    /// Logical length clamped to capacity
    #[must_use]
    pub fn len(&self) -> usize {
        usize::try_from(self.declared_len).map_or(MAX_ARRAY_LEN, |n| n.min(MAX_ARRAY_LEN))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the declared length exceeds the physical capacity
    #[must_use]
    pub fn is_clamped(&self) -> bool {
        self.declared_len > MAX_ARRAY_LEN as u64
    }

    /// The logically valid values
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.slots[..self.len()]
    }

    /// All 100 physical slots, padding included
    #[must_use]
    pub fn slots(&self) -> &[f64] {
        &self.slots
    }

    /// The first `n` physical slots regardless of the declared length.
    ///
    /// Validation compares a fixed prefix of positions and velocities even
    /// when the controller reports a shorter array.
    #[must_use]
    pub fn prefix(&self, n: usize) -> &[f64] {
        &self.slots[..n.min(MAX_ARRAY_LEN)]
    }
}

impl Default for BoundedArray {
    fn default() -> Self {
        Self::from_values(&[])
    }
}

impl Serialize for BoundedArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.values())
    }
}

/// One waypoint of a joint trajectory
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrajectoryPoint {
    pub positions: BoundedArray,
    pub velocities: BoundedArray,
    pub accelerations: BoundedArray,
    pub effort: BoundedArray,
    pub time_from_start_sec: i32,
    pub time_from_start_nsec: u32,
}

impl TrajectoryPoint {
    /// Decode a point from the start of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let reader = Reader::new(buf, "TrajectoryPoint", POINT_SIZE)?;
        Self::decode_from(&reader)
    }

    pub(crate) fn decode_from(reader: &Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            positions: BoundedArray::decode(reader, point::POSITIONS)?,
            velocities: BoundedArray::decode(reader, point::VELOCITIES)?,
            accelerations: BoundedArray::decode(reader, point::ACCELERATIONS)?,
            effort: BoundedArray::decode(reader, point::EFFORT)?,
            time_from_start_sec: reader.i32(point::TIME_SEC)?,
            time_from_start_nsec: reader.u32(point::TIME_NSEC)?,
        })
    }

    /// Write the point into the first `POINT_SIZE` bytes of `buf`
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<(), CodecError> {
        if buf.len() < POINT_SIZE {
            return Err(CodecError::BufferTooShort {
                structure: "TrajectoryPoint",
                required: POINT_SIZE,
                actual: buf.len(),
            });
        }
        self.encode_with(&mut Writer::new(buf));
        Ok(())
    }

    pub(crate) fn encode_with(&self, writer: &mut Writer<'_>) {
        self.positions.encode(writer, point::POSITIONS);
        self.velocities.encode(writer, point::VELOCITIES);
        self.accelerations.encode(writer, point::ACCELERATIONS);
        self.effort.encode(writer, point::EFFORT);
        writer.i32(point::TIME_SEC, self.time_from_start_sec);
        writer.u32(point::TIME_NSEC, self.time_from_start_nsec);
    }

    /// Whether any array declared more values than it can hold
    #[must_use]
    pub fn is_clamped(&self) -> bool {
        [
            &self.positions,
            &self.velocities,
            &self.accelerations,
            &self.effort,
        ]
        .iter()
        .any(|a| a.is_clamped())
    }
}
