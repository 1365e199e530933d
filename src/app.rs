//! Wiring of configured service clients into a pipeline

use std::sync::Arc;

use crate::Config;
use crate::llm::{ChatModel, OpenAiChat};
use crate::pipeline::TurnPipeline;
use crate::sessions::SessionStore;
use crate::voice::{SpeechToText, Synthesizer, TextToSpeech, Transcriber};

/// Configured clients for the three hosted services
#[derive(Clone)]
pub struct Services {
    pub transcriber: Arc<dyn Transcriber>,
    pub chat: Arc<dyn ChatModel>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl Services {
    /// Build the Deepgram, `OpenAI` and `ElevenLabs` clients from config
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let keys = &config.api_keys;
        if keys.deepgram.is_none() || keys.openai.is_none() || keys.elevenlabs.is_none() {
            tracing::warn!(
                deepgram = keys.deepgram.is_some(),
                openai = keys.openai.is_some(),
                elevenlabs = keys.elevenlabs.is_some(),
                "some API keys are missing; affected calls will fail"
            );
        }

        Self {
            transcriber: Arc::new(SpeechToText::new_deepgram(
                keys.deepgram.as_ref(),
                &config.stt,
                config.remote.clone(),
            )),
            chat: Arc::new(OpenAiChat::new(
                keys.openai.as_ref(),
                &config.llm,
                config.remote.clone(),
            )),
            synthesizer: Arc::new(TextToSpeech::new_elevenlabs(
                keys.elevenlabs.as_ref(),
                &config.tts,
                config.remote.clone(),
            )),
        }
    }

    #[must_use]
    pub fn pipeline(&self) -> TurnPipeline {
        TurnPipeline::new(self.transcriber.clone(), self.synthesizer.clone())
    }

    #[must_use]
    pub fn session_store(&self, config: &Config) -> SessionStore {
        SessionStore::new(self.chat.clone(), config.llm.session_settings())
    }
}
