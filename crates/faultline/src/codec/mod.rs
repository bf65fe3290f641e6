//! Binary codec for the controller protocol.
//!
//! Two fixed-layout, little-endian structures cross the IPC boundary:
//!
//! - [`State`]: the request written to the input buffer each iteration
//! - [`Vote`]: the response read back from the output buffer
//!
//! Offsets are spelled out in [`layout`] instead of being inferred from any
//! in-memory struct, because the controller's C/C++ compiler inserts
//! alignment pads (after every 4-byte index that precedes an 8-byte field).

pub mod layout;

mod format;
mod point;
mod state;
mod vote;

pub use format::{format_state_text, format_vote_text};
pub use layout::{POINT_SIZE, STATE_MIN_SIZE, VOTE_SIZE};
pub use point::{BoundedArray, TrajectoryPoint};
pub use state::{
    decode_state, encode_state, encode_state_passthrough, read_state_file, LengthOverflow, State,
};
pub use vote::{decode_vote, encode_vote, read_vote_file, Vote};

use thiserror::Error;

/// Errors raised while decoding or framing protocol buffers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The buffer cannot hold the structure
    #[error("{structure} buffer too short: need {required} bytes, got {actual}")]
    BufferTooShort {
        /// Structure being decoded
        structure: &'static str,
        /// Bytes the layout requires
        required: usize,
        /// Bytes available
        actual: usize,
    },

    /// A raw payload does not fit in the IPC buffer
    #[error("payload of {size} bytes exceeds buffer capacity of {capacity} bytes")]
    PayloadTooLarge {
        /// Payload size
        size: usize,
        /// Buffer size
        capacity: usize,
    },
}
