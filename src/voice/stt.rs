//! Speech-to-text (STT) via Deepgram prerecorded transcription

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::{AudioPayload, Transcriber};
use crate::config::SttConfig;
use crate::error::RemoteError;
use crate::remote::{CallPolicy, ensure_success};
use crate::{Error, Result};

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// Extract `results.channels[0].alternatives[0].transcript` from a response body
///
/// A present but empty transcript is returned as-is; a missing path is an error.
///
/// # Errors
///
/// Returns [`RemoteError::Malformed`] if the body is not JSON or lacks the transcript path
pub fn parse_transcript(body: &[u8]) -> std::result::Result<String, RemoteError> {
    let response: DeepgramResponse = serde_json::from_slice(body)
        .map_err(|e| RemoteError::Malformed(format!("unexpected transcription body: {e}")))?;

    let channel = response
        .results
        .channels
        .into_iter()
        .next()
        .ok_or_else(|| RemoteError::Malformed("transcription has no channels".to_string()))?;

    channel
        .alternatives
        .into_iter()
        .next()
        .map(|a| a.transcript)
        .ok_or_else(|| RemoteError::Malformed("transcription has no alternatives".to_string()))
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    tier: Option<String>,
    punctuate: bool,
    policy: CallPolicy,
}

impl SpeechToText {
    /// Create a new Deepgram STT client
    ///
    /// A missing key is not rejected here; the service refuses the request
    /// and the failure surfaces from [`Transcriber::transcribe`].
    #[must_use]
    pub fn new_deepgram(api_key: Option<&SecretString>, config: &SttConfig, policy: CallPolicy) -> Self {
        let api_key = api_key.map_or_else(String::new, |k| k.expose_secret().to_owned());

        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            tier: config.tier.clone(),
            punctuate: config.punctuate,
            policy,
        }
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("model", self.model.clone()),
            ("punctuate", self.punctuate.to_string()),
        ];
        if let Some(tier) = &self.tier {
            query.push(("tier", tier.clone()));
        }
        query
    }

    async fn request(&self, audio: &AudioPayload) -> std::result::Result<String, RemoteError> {
        let url = format!("{}/v1/listen", self.base_url);

        let response = self
            .client
            .post(&url)
            .query(&self.query())
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("Content-Type", audio.mime_type())
            .body(audio.bytes().to_vec())
            .send()
            .await?;

        let body = ensure_success(response).await?.bytes().await?;
        parse_transcript(&body)
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), model = %self.model, "starting Deepgram transcription");

        let transcript = self
            .policy
            .run("deepgram", || self.request(audio))
            .await
            .map_err(Error::Transcription)?;

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_transcript() {
        let body = br#"{"results":{"channels":[{"alternatives":[{"transcript":"hello there","confidence":0.98}]}]}}"#;
        assert_eq!(parse_transcript(body).unwrap(), "hello there");
    }

    #[test]
    fn empty_transcript_is_not_an_error() {
        let body = br#"{"results":{"channels":[{"alternatives":[{"transcript":""}]}]}}"#;
        assert_eq!(parse_transcript(body).unwrap(), "");
    }

    #[test]
    fn missing_channels_is_malformed() {
        let body = br#"{"results":{}}"#;
        assert!(matches!(parse_transcript(body), Err(RemoteError::Malformed(_))));
    }

    #[test]
    fn empty_channels_is_malformed() {
        let body = br#"{"results":{"channels":[]}}"#;
        assert!(matches!(parse_transcript(body), Err(RemoteError::Malformed(_))));
    }

    #[test]
    fn empty_alternatives_is_malformed() {
        let body = br#"{"results":{"channels":[{"alternatives":[]}]}}"#;
        assert!(matches!(parse_transcript(body), Err(RemoteError::Malformed(_))));
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse_transcript(b"<html>gateway error</html>"),
            Err(RemoteError::Malformed(_))
        ));
    }

    #[test]
    fn query_includes_tier_when_set() {
        let config = SttConfig {
            tier: Some("enhanced".to_string()),
            ..SttConfig::default()
        };
        let stt = SpeechToText::new_deepgram(None, &config, CallPolicy::default());
        let query = stt.query();

        assert!(query.contains(&("model", "general".to_string())));
        assert!(query.contains(&("punctuate", "true".to_string())));
        assert!(query.contains(&("tier", "enhanced".to_string())));
    }
}
