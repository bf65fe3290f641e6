//! Result and error types for Faultline.
//!
//! Only session-level problems surface here. Per-test-case failures
//! (crashes, timeouts, undecodable output) are captured in
//! [`crate::runner::Outcome`] so one broken test case never stops the rest.

use crate::codec::CodecError;
use thiserror::Error;

/// Result type for Faultline operations
pub type FaultlineResult<T> = Result<T, FaultlineError>;

/// Errors that can occur in Faultline
#[derive(Debug, Error)]
pub enum FaultlineError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol buffer could not be decoded
    #[error("Decode error: {0}")]
    Codec(#[from] CodecError),

    /// Compilation or link step failed
    #[error("Build failed ({stage}): {diagnostic}")]
    Build {
        /// Toolchain step that failed
        stage: String,
        /// Captured compiler output
        diagnostic: String,
    },

    /// A tool could not be started at all
    #[error("Failed to run {program}: {message}")]
    ToolLaunch {
        /// Program name
        program: String,
        /// Error message
        message: String,
    },

    /// Condition that aborts the whole session
    #[error("Session error: {message}")]
    Session {
        /// Error message
        message: String,
    },

    /// Coverage collection failed for a test case
    #[error("Coverage collection failed: {message}")]
    Coverage {
        /// Error message
        message: String,
    },

    /// Controller process could not be managed
    #[error("Controller process error: {message}")]
    Process {
        /// Error message
        message: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    Config {
        /// Error message
        message: String,
    },
}

impl FaultlineError {
    /// Create a build error
    #[must_use]
    pub fn build(stage: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self::Build {
            stage: stage.into(),
            diagnostic: diagnostic.into(),
        }
    }

    /// Create a tool launch error
    #[must_use]
    pub fn tool_launch(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolLaunch {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Create a session error
    #[must_use]
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create a coverage error
    #[must_use]
    pub fn coverage(message: impl Into<String>) -> Self {
        Self::Coverage {
            message: message.into(),
        }
    }

    /// Create a process error
    #[must_use]
    pub fn process(message: impl Into<String>) -> Self {
        Self::Process {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error carries compiler diagnostics
    #[must_use]
    pub const fn is_build_failure(&self) -> bool {
        matches!(self, Self::Build { .. })
    }
}
