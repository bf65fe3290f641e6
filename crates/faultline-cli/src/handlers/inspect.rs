//! Inspect command handler

use super::print_json;
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::OutputFormat;
use crate::{BufferKind, InspectArgs};
use faultline::codec::{
    decode_state, decode_vote, format_state_text, format_vote_text, State, Vote, VOTE_SIZE,
};
use faultline::FaultlineError;
use serde::Serialize;

/// A decoded buffer file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DecodedBuffer {
    /// Request buffer
    State(State),
    /// Response buffer
    Vote(Vote),
}

impl DecodedBuffer {
    /// Decode `bytes` as `kind`
    pub fn decode(bytes: &[u8], kind: BufferKind) -> CliResult<Self> {
        let decoded = match kind {
            BufferKind::State => Self::State(decode_state(bytes).map_err(FaultlineError::from)?),
            BufferKind::Vote => Self::Vote(decode_vote(bytes).map_err(FaultlineError::from)?),
        };
        Ok(decoded)
    }

    /// Human-readable dump
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::State(state) => format_state_text(state),
            Self::Vote(vote) => format_vote_text(vote),
        }
    }
}

/// Vote files have exactly the vote size; anything else is read as a state
#[must_use]
pub const fn guess_kind(len: usize) -> BufferKind {
    if len == VOTE_SIZE {
        BufferKind::Vote
    } else {
        BufferKind::State
    }
}

/// Execute the inspect command
pub fn execute_inspect(_config: &CliConfig, args: &InspectArgs) -> CliResult<()> {
    let bytes = std::fs::read(&args.file)?;
    let kind = args.kind.unwrap_or_else(|| guess_kind(bytes.len()));
    tracing::debug!(file = %args.file.display(), len = bytes.len(), ?kind, "decoding buffer");

    let decoded = DecodedBuffer::decode(&bytes, kind)?;
    match OutputFormat::from(args.format) {
        OutputFormat::Json => print_json(&decoded)?,
        OutputFormat::Text => print!("{}", decoded.to_text()),
    }
    Ok(())
}
