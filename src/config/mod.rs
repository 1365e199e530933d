//! Configuration management for voxchat
//!
//! Every setting resolves as env > TOML file > default. Credentials are read
//! once here and never validated; a missing key only fails when the
//! corresponding service is called.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::conversation::{DEFAULT_SYSTEM_PROMPT, FailedTurnPolicy, SessionSettings};
use crate::remote::{CallPolicy, RetryPolicy};
use file::VoxchatConfigFile;

/// Deepgram's public endpoint
pub const DEFAULT_DEEPGRAM_URL: &str = "https://api.deepgram.com";
/// OpenAI's public endpoint
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
/// ElevenLabs' public endpoint
pub const DEFAULT_ELEVENLABS_URL: &str = "https://api.elevenlabs.io";
/// ElevenLabs stock voice "Bella"
pub const DEFAULT_TTS_VOICE: &str = "EXAVITQu4vr4xnSDxMaL";
/// Largest accepted audio upload (25 MiB, minutes of 48 kHz mono WAV)
pub const DEFAULT_MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;
/// Idle time after which a session is forgotten
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// voxchat configuration
#[derive(Debug)]
pub struct Config {
    /// API keys
    pub api_keys: ApiKeys,

    /// Speech-to-text configuration
    pub stt: SttConfig,

    /// Chat completion configuration
    pub llm: LlmConfig,

    /// Text-to-speech configuration
    pub tts: TtsConfig,

    /// Timeout/retry applied to every remote call
    pub remote: CallPolicy,

    /// HTTP API server configuration
    pub server: ServerConfig,
}

/// API keys for external services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// Deepgram API key (STT)
    pub deepgram: Option<SecretString>,

    /// `OpenAI` API key (chat completions)
    pub openai: Option<SecretString>,

    /// `ElevenLabs` API key (TTS)
    pub elevenlabs: Option<SecretString>,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SttConfig {
    pub base_url: String,
    pub model: String,
    pub tier: Option<String>,
    pub punctuate: bool,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DEEPGRAM_URL.to_string(),
            model: "general".to_string(),
            tier: Some("enhanced".to_string()),
            punctuate: true,
        }
    }
}

/// Chat completion configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub max_context_turns: Option<usize>,
    pub failed_turn_policy: FailedTurnPolicy,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_URL.to_string(),
            model: "gpt-3.5-turbo".to_string(),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_context_turns: None,
            failed_turn_policy: FailedTurnPolicy::Retain,
        }
    }
}

impl LlmConfig {
    /// Session tunables derived from this configuration
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            system_prompt: self.system_prompt.clone(),
            max_context_turns: self.max_context_turns,
            failed_turn_policy: self.failed_turn_policy,
        }
    }
}

/// Text-to-speech configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtsConfig {
    pub base_url: String,
    pub voice: String,
    pub model: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ELEVENLABS_URL.to_string(),
            voice: DEFAULT_TTS_VOICE.to_string(),
            model: "eleven_monolingual_v1".to_string(),
        }
    }
}

/// HTTP API server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Path to static files directory (web UI)
    pub static_dir: Option<PathBuf>,

    /// Largest accepted audio upload in bytes
    pub max_audio_bytes: usize,

    /// Idle sessions are evicted after this long (`None` keeps them forever)
    pub session_ttl: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 7860,
            static_dir: None,
            max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
            session_ttl: Some(DEFAULT_SESSION_TTL),
        }
    }
}

/// Treat an empty string as "unset"
fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

fn parse_policy(value: &str) -> Option<FailedTurnPolicy> {
    match value.to_ascii_lowercase().as_str() {
        "retain" => Some(FailedTurnPolicy::Retain),
        "discard" => Some(FailedTurnPolicy::Discard),
        other => {
            tracing::warn!(value = other, "unknown failed turn policy, ignoring");
            None
        }
    }
}

impl Config {
    /// Load configuration from `.env`, the process environment and the config file
    #[must_use]
    pub fn load() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }

        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    #[must_use]
    pub fn resolve(fc: VoxchatConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            deepgram: env("DEEPGRAM_API_KEY")
                .or(fc.api_keys.deepgram)
                .map(SecretString::from),
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from),
            elevenlabs: env("ELEVENLABS_API_KEY")
                .or(fc.api_keys.elevenlabs)
                .map(SecretString::from),
        };

        let stt_default = SttConfig::default();
        let stt = SttConfig {
            base_url: env("VOXCHAT_STT_URL")
                .or(fc.stt.base_url)
                .unwrap_or(stt_default.base_url),
            model: env("VOXCHAT_STT_MODEL")
                .or(fc.stt.model)
                .unwrap_or(stt_default.model),
            tier: match env("VOXCHAT_STT_TIER").or(fc.stt.tier) {
                Some(tier) => non_empty(tier),
                None => stt_default.tier,
            },
            punctuate: fc.stt.punctuate.unwrap_or(stt_default.punctuate),
        };

        let llm_default = LlmConfig::default();
        let llm = LlmConfig {
            base_url: env("VOXCHAT_LLM_URL")
                .or(fc.llm.base_url)
                .unwrap_or(llm_default.base_url),
            model: env("VOXCHAT_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or(llm_default.model),
            system_prompt: match env("VOXCHAT_SYSTEM_PROMPT").or(fc.llm.system_prompt) {
                Some(prompt) => non_empty(prompt),
                None => llm_default.system_prompt,
            },
            max_context_turns: env("VOXCHAT_MAX_CONTEXT_TURNS")
                .and_then(|s| s.parse().ok())
                .or(fc.llm.max_context_turns),
            failed_turn_policy: env("VOXCHAT_FAILED_TURN_POLICY")
                .and_then(|s| parse_policy(&s))
                .or(fc.llm.failed_turn_policy)
                .unwrap_or(llm_default.failed_turn_policy),
        };

        let tts_default = TtsConfig::default();
        let tts = TtsConfig {
            base_url: env("VOXCHAT_TTS_URL")
                .or(fc.tts.base_url)
                .unwrap_or(tts_default.base_url),
            voice: env("VOXCHAT_TTS_VOICE")
                .or(fc.tts.voice)
                .unwrap_or(tts_default.voice),
            model: env("VOXCHAT_TTS_MODEL")
                .or(fc.tts.model)
                .unwrap_or(tts_default.model),
        };

        // Remote call policy (env > toml > default)
        let remote_default = CallPolicy::default();
        let retry_default = remote_default.retry;
        let remote = CallPolicy {
            timeout: env("VOXCHAT_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .or(fc.remote.timeout_secs)
                .map_or(remote_default.timeout, Duration::from_secs),
            retry: RetryPolicy {
                max_retries: env("VOXCHAT_MAX_RETRIES")
                    .and_then(|s| s.parse().ok())
                    .or(fc.remote.max_retries)
                    .unwrap_or(retry_default.max_retries),
                base_delay: fc
                    .remote
                    .retry_base_delay_ms
                    .map_or(retry_default.base_delay, Duration::from_millis),
                max_delay: fc
                    .remote
                    .retry_max_delay_ms
                    .map_or(retry_default.max_delay, Duration::from_millis),
            },
        };

        let server_default = ServerConfig::default();
        let server = ServerConfig {
            port: env("VOXCHAT_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(server_default.port),
            static_dir: env("VOXCHAT_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            max_audio_bytes: env("VOXCHAT_MAX_AUDIO_BYTES")
                .and_then(|s| s.parse().ok())
                .or(fc.server.max_audio_bytes)
                .unwrap_or(server_default.max_audio_bytes),
            // 0 disables eviction
            session_ttl: match env("VOXCHAT_SESSION_TTL_SECS")
                .and_then(|s| s.parse().ok())
                .or(fc.server.session_ttl_secs)
            {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => server_default.session_ttl,
            },
        };

        Self {
            api_keys,
            stt,
            llm,
            tts,
            remote,
            server,
        }
    }
}
