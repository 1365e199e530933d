//! Error types for voxchat

use std::time::Duration;

use thiserror::Error;

/// Result type alias for voxchat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in voxchat
#[derive(Debug, Error)]
pub enum Error {
    /// Speech-to-text stage failed
    #[error("transcription error: {0}")]
    Transcription(RemoteError),

    /// Chat completion stage failed
    #[error("generation error: {0}")]
    Generation(RemoteError),

    /// Text-to-speech stage failed
    #[error("synthesis error: {0}")]
    Synthesis(RemoteError),

    /// Pipeline run was cancelled before completion
    #[error("turn cancelled")]
    Cancelled,

    /// Audio input could not be read
    #[error("audio error: {0}")]
    Audio(String),

    /// Listener bind or socket failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The remote failure behind a stage error, if any
    #[must_use]
    pub const fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Transcription(e) | Self::Generation(e) | Self::Synthesis(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure of a single call to a hosted service
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure (connect, TLS, body read)
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// No response within the configured deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Response did not have the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Whether another attempt could plausibly succeed
    ///
    /// Rate limits, server errors, timeouts and transport failures are
    /// transient. Client errors and malformed bodies are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => !e.is_decode() && !e.is_builder(),
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Timeout(_) => true,
            Self::Malformed(_) => false,
        }
    }
}
