//! Voice turn endpoints
//!
//! `POST /turn` runs one full pipeline turn for the session named by the
//! `x-session-id` header. Uploads larger than the configured audio limit are
//! rejected with `413`. If the client disconnects mid-turn, axum drops the
//! handler future and the turn is abandoned at its next await point.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use serde::Serialize;

use super::ApiState;
use crate::error::RemoteError;
use crate::pipeline::ChatHistoryEntry;
use crate::sessions::SessionState;
use crate::voice::{AudioPayload, WAV_MIME};

/// Header carrying the caller's session id
pub const SESSION_HEADER: &str = "x-session-id";

/// Session used when the header is absent
pub const DEFAULT_SESSION: &str = "default";

/// Build voice router
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route(
            "/turn",
            post(turn).layer(DefaultBodyLimit::max(state.max_audio_bytes)),
        )
        .route("/history", get(history))
        .route("/session", axum::routing::delete(reset_session))
        .with_state(state)
}

fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_SESSION)
        .to_string()
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(WAV_MIME)
        .to_string()
}

fn encode(audio: &AudioPayload) -> String {
    base64::engine::general_purpose::STANDARD.encode(audio.bytes())
}

/// Turn response
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    /// Replacement for the client's recorder; `null` clears it
    pub input: Option<String>,
    /// Base64-encoded reply audio
    pub audio: String,
    pub audio_mime: String,
    pub transcript: String,
    pub reply: String,
    pub history: Vec<ChatHistoryEntry>,
}

/// Run one voice turn
async fn turn(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TurnResponse>, VoiceError> {
    if body.is_empty() {
        return Err(VoiceError::BadRequest("Empty audio data"));
    }

    let id = session_id(&headers);
    let audio = AudioPayload::new(body.to_vec(), content_type(&headers));

    let session = state.sessions.get_or_create(&id).await;
    let mut guard = session.lock().await;
    let session_state: &mut SessionState = &mut guard;
    session_state.touch();

    let outcome = state
        .pipeline
        .process_cancellable(
            &mut session_state.conversation,
            &audio,
            &session_state.display_history,
            &state.shutdown,
        )
        .await
        .map_err(|e| {
            tracing::warn!(session_id = %id, error = %e, "voice turn failed");
            VoiceError::from(e)
        })?;

    session_state.display_history.clone_from(&outcome.history);

    let (transcript, reply) = outcome
        .latest()
        .map(|e| (e.user().to_string(), e.assistant().to_string()))
        .unwrap_or_default();

    Ok(Json(TurnResponse {
        input: outcome.cleared_input.map(|a| encode(&a)),
        audio_mime: outcome.response_audio.mime_type().to_string(),
        audio: encode(&outcome.response_audio),
        transcript,
        reply,
        history: outcome.history,
    }))
}

/// History response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub history: Vec<ChatHistoryEntry>,
}

/// Get the display history for a session
async fn history(State(state): State<Arc<ApiState>>, headers: HeaderMap) -> Json<HistoryResponse> {
    let id = session_id(&headers);
    let history = match state.sessions.get(&id).await {
        Some(session) => session.lock().await.display_history.clone(),
        None => Vec::new(),
    };

    Json(HistoryResponse {
        session_id: id,
        history,
    })
}

/// Forget a session's conversation and display history
async fn reset_session(State(state): State<Arc<ApiState>>, headers: HeaderMap) -> StatusCode {
    let id = session_id(&headers);
    if state.sessions.remove(&id).await {
        tracing::info!(session_id = %id, "session removed");
    }
    StatusCode::NO_CONTENT
}

/// Voice API errors
#[derive(Debug)]
pub enum VoiceError {
    BadRequest(&'static str),
    TranscriptionFailed(String),
    GenerationFailed(String),
    SynthesisFailed(String),
    Timeout(String),
    Cancelled,
    Internal(String),
}

impl From<crate::Error> for VoiceError {
    fn from(e: crate::Error) -> Self {
        let message = e.to_string();
        if matches!(e.remote(), Some(RemoteError::Timeout(_))) {
            return Self::Timeout(message);
        }

        match e {
            crate::Error::Transcription(_) => Self::TranscriptionFailed(message),
            crate::Error::Generation(_) => Self::GenerationFailed(message),
            crate::Error::Synthesis(_) => Self::SynthesisFailed(message),
            crate::Error::Cancelled => Self::Cancelled,
            _ => Self::Internal(message),
        }
    }
}

impl IntoResponse for VoiceError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.to_string()),
            Self::TranscriptionFailed(msg) => (StatusCode::BAD_GATEWAY, "transcription_failed", msg),
            Self::GenerationFailed(msg) => (StatusCode::BAD_GATEWAY, "generation_failed", msg),
            Self::SynthesisFailed(msg) => (StatusCode::BAD_GATEWAY, "synthesis_failed", msg),
            Self::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "timeout", msg),
            Self::Cancelled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "cancelled",
                "turn cancelled".to_string(),
            ),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn session_id_defaults_when_missing_or_blank() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_id(&headers), DEFAULT_SESSION);

        headers.insert(SESSION_HEADER, HeaderValue::from_static("  "));
        assert_eq!(session_id(&headers), DEFAULT_SESSION);

        headers.insert(SESSION_HEADER, HeaderValue::from_static("alice"));
        assert_eq!(session_id(&headers), "alice");
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let err = crate::Error::Synthesis(RemoteError::Timeout(std::time::Duration::from_secs(3)));
        let response = VoiceError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn stage_errors_map_to_bad_gateway() {
        let err = crate::Error::Transcription(RemoteError::Malformed("no channels".to_string()));
        let response = VoiceError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
