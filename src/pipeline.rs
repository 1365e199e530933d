//! Turn pipeline: transcribe → generate → synthesize → record
//!
//! One [`TurnPipeline::process`] call handles one user interaction. The three
//! remote stages run strictly in order since each consumes the previous
//! stage's output. Any failure aborts the rest of the turn and the caller's
//! display history is left untouched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::conversation::ConversationSession;
use crate::voice::{AudioPayload, Synthesizer, Transcriber};
use crate::{Error, Result};

/// One display row: what the user said and what the assistant answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistoryEntry(pub String, pub String);

impl ChatHistoryEntry {
    #[must_use]
    pub fn user(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn assistant(&self) -> &str {
        &self.1
    }
}

/// Result of a successful turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Replacement for the input slot; always `None` so the recorder is cleared
    pub cleared_input: Option<AudioPayload>,
    /// Synthesized reply for immediate playback
    pub response_audio: AudioPayload,
    /// Display history including this turn
    pub history: Vec<ChatHistoryEntry>,
}

impl TurnOutcome {
    /// The entry appended by this turn
    #[must_use]
    pub fn latest(&self) -> Option<&ChatHistoryEntry> {
        self.history.last()
    }
}

/// Orchestrates the speech and chat services for one interaction
#[derive(Clone)]
pub struct TurnPipeline {
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
}

impl TurnPipeline {
    #[must_use]
    pub fn new(transcriber: Arc<dyn Transcriber>, synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            transcriber,
            synthesizer,
        }
    }

    /// Run one full turn against `session`
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's error: [`Error::Transcription`],
    /// [`Error::Generation`] or [`Error::Synthesis`]
    pub async fn process(
        &self,
        session: &mut ConversationSession,
        raw_audio: &AudioPayload,
        display_history: &[ChatHistoryEntry],
    ) -> Result<TurnOutcome> {
        tracing::debug!(audio_bytes = raw_audio.len(), "turn started");

        let text = self.transcriber.transcribe(raw_audio).await?;
        let reply = session.advance(&text).await?;
        let response_audio = self.synthesizer.synthesize(&reply).await?;

        let mut history = display_history.to_vec();
        history.push(ChatHistoryEntry(text, reply));

        tracing::info!(
            history = history.len(),
            audio_bytes = response_audio.len(),
            "turn complete"
        );

        Ok(TurnOutcome {
            cleared_input: None,
            response_audio,
            history,
        })
    }

    /// Run one turn, abandoning it if `cancel` fires first
    ///
    /// Cancellation takes effect at the next await point. A generation that
    /// completed before cancellation stays recorded in the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] on cancellation, otherwise as [`Self::process`]
    pub async fn process_cancellable(
        &self,
        session: &mut ConversationSession,
        raw_audio: &AudioPayload,
        display_history: &[ChatHistoryEntry],
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("turn cancelled");
                Err(Error::Cancelled)
            }
            outcome = self.process(session, raw_audio, display_history) => outcome,
        }
    }
}
