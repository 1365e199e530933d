//! voxchat - Voice chatbot service
//!
//! This library provides one conversational voice turn built from three
//! hosted services:
//! - Speech-to-text (Deepgram)
//! - Chat completion (`OpenAI`)
//! - Text-to-speech (`ElevenLabs`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              HTTP API  │  CLI                        │
//! └────────────────────┬────────────────────────────────┘
//!                      │ audio + session id
//! ┌────────────────────▼────────────────────────────────┐
//! │   SessionStore ──► TurnPipeline                      │
//! │   transcribe ──► ConversationSession ──► synthesize  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ timeout + retry
//! ┌────────────────────▼────────────────────────────────┐
//! │      Deepgram   │   OpenAI   │   ElevenLabs          │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod remote;
pub mod sessions;
pub mod voice;

pub use app::Services;
pub use config::Config;
pub use conversation::{
    Conversation, ConversationSession, FailedTurnPolicy, Role, SessionSettings, Turn,
};
pub use error::{Error, RemoteError, Result};
pub use llm::{ChatModel, OpenAiChat};
pub use pipeline::{ChatHistoryEntry, TurnOutcome, TurnPipeline};
pub use remote::{CallPolicy, RetryPolicy};
pub use sessions::SessionStore;
pub use voice::{AudioPayload, SpeechToText, Synthesizer, TextToSpeech, Transcriber};
