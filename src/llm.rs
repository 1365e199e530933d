//! Chat completion client
//!
//! Sends the ordered conversation to an `OpenAI`-compatible
//! `/v1/chat/completions` endpoint and returns the first choice.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::conversation::Turn;
use crate::error::RemoteError;
use crate::remote::{CallPolicy, ensure_success};
use crate::{Error, Result};

/// Generates the next assistant message for a conversation
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Request exactly one completion for `turns`
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Generation`] if the service call fails or the
    /// response has no first choice with content
    async fn complete(&self, turns: &[Turn]) -> Result<String>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    n: u32,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Extract `choices[0].message.content` from a completion body
///
/// # Errors
///
/// Returns [`RemoteError::Malformed`] if the body is not JSON, has no
/// choices, or the first choice has no content
pub fn parse_completion(body: &[u8]) -> std::result::Result<String, RemoteError> {
    let response: ChatCompletionResponse = serde_json::from_slice(body)
        .map_err(|e| RemoteError::Malformed(format!("unexpected completion body: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| RemoteError::Malformed("completion has no choices".to_string()))?
        .message
        .content
        .ok_or_else(|| RemoteError::Malformed("completion choice has no content".to_string()))
}

/// `OpenAI` chat completions client
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    policy: CallPolicy,
}

impl OpenAiChat {
    /// Create a new chat completions client
    ///
    /// A missing key is not rejected here; the service refuses the request
    /// and the failure surfaces from [`ChatModel::complete`].
    #[must_use]
    pub fn new(api_key: Option<&SecretString>, config: &LlmConfig, policy: CallPolicy) -> Self {
        let api_key = api_key.map_or_else(String::new, |k| k.expose_secret().to_owned());

        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            policy,
        }
    }

    async fn request(&self, turns: &[Turn]) -> std::result::Result<String, RemoteError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: turns
                .iter()
                .map(|t| RequestMessage {
                    role: t.role().as_str(),
                    content: t.content(),
                })
                .collect(),
            n: 1,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await?;

        let body = ensure_success(response).await?.bytes().await?;
        parse_completion(&body)
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, turns: &[Turn]) -> Result<String> {
        tracing::debug!(messages = turns.len(), model = %self.model, "requesting chat completion");

        let reply = self
            .policy
            .run("openai", || self.request(turns))
            .await
            .map_err(Error::Generation)?;

        tracing::info!(chars = reply.len(), "completion received");
        Ok(reply)
    }
}
