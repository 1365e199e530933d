//! Voice processing module
//!
//! Speech-to-text and text-to-speech adapters for hosted services, plus the
//! opaque audio payload passed between them.

mod stt;
mod tts;
mod wav;

use async_trait::async_trait;

pub use stt::{SpeechToText, parse_transcript};
pub use tts::TextToSpeech;
pub use wav::{WavInfo, inspect_wav, samples_to_wav};

use crate::Result;

/// MIME type of recorded input audio
pub const WAV_MIME: &str = "audio/wav";

/// MIME type of synthesized output audio
pub const MPEG_MIME: &str = "audio/mpeg";

/// Opaque audio blob exchanged with remote services
///
/// The bytes are never inspected by the pipeline; the MIME type travels
/// with them so adapters can label outbound requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    bytes: Vec<u8>,
    mime_type: String,
}

impl AudioPayload {
    /// Wrap raw bytes with an explicit MIME type
    #[must_use]
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Recorded WAV audio
    #[must_use]
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self::new(bytes, WAV_MIME)
    }

    /// Synthesized MP3 audio
    #[must_use]
    pub fn mpeg(bytes: Vec<u8>) -> Self {
        Self::new(bytes, MPEG_MIME)
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume the payload, returning the raw bytes
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Converts recorded speech into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio payload
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transcription`] if the service call fails or
    /// the response carries no transcript
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String>;
}

/// Converts text into speech audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize speech for `text`
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Synthesis`] if the service call fails
    async fn synthesize(&self, text: &str) -> Result<AudioPayload>;
}
