//! Text-to-speech (TTS) via ElevenLabs

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::{AudioPayload, Synthesizer};
use crate::config::TtsConfig;
use crate::error::RemoteError;
use crate::remote::{CallPolicy, ensure_success};
use crate::{Error, Result};

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    voice: String,
    model: String,
    policy: CallPolicy,
}

impl TextToSpeech {
    /// Create a new ElevenLabs TTS client
    ///
    /// A missing key is not rejected here; the service refuses the request
    /// and the failure surfaces from [`Synthesizer::synthesize`].
    #[must_use]
    pub fn new_elevenlabs(
        api_key: Option<&SecretString>,
        config: &TtsConfig,
        policy: CallPolicy,
    ) -> Self {
        let api_key = api_key.map_or_else(String::new, |k| k.expose_secret().to_owned());

        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            voice: config.voice.clone(),
            model: config.model.clone(),
            policy,
        }
    }

    async fn request(&self, text: &str) -> std::result::Result<Vec<u8>, RemoteError> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice);

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", super::MPEG_MIME)
            .json(&request)
            .send()
            .await?;

        let audio = ensure_success(response).await?.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<AudioPayload> {
        tracing::debug!(chars = text.len(), voice = %self.voice, "starting ElevenLabs synthesis");

        let audio = self
            .policy
            .run("elevenlabs", || self.request(text))
            .await
            .map_err(Error::Synthesis)?;

        tracing::info!(audio_bytes = audio.len(), "synthesis complete");
        Ok(AudioPayload::mpeg(audio))
    }
}
