//! TOML configuration file loading
//!
//! Supports `~/.config/voxchat/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::conversation::FailedTurnPolicy;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoxchatConfigFile {
    /// Speech-to-text settings
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Chat completion settings
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Text-to-speech settings
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Timeout/retry settings for remote calls
    #[serde(default)]
    pub remote: RemoteFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    pub base_url: Option<String>,
    /// Deepgram model (e.g. "general", "nova-2")
    pub model: Option<String>,
    /// Deepgram tier (e.g. "enhanced"); empty string disables it
    pub tier: Option<String>,
    pub punctuate: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    pub base_url: Option<String>,
    /// Model identifier (e.g. "gpt-3.5-turbo")
    pub model: Option<String>,
    /// System preamble; empty string disables it
    pub system_prompt: Option<String>,
    /// Most recent turns sent per request
    pub max_context_turns: Option<usize>,
    /// "retain" or "discard"
    pub failed_turn_policy: Option<FailedTurnPolicy>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    pub base_url: Option<String>,
    /// ElevenLabs voice id
    pub voice: Option<String>,
    /// ElevenLabs model id
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoteFileConfig {
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub retry_max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub deepgram: Option<String>,
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    /// Directory with a static web UI to serve at `/`
    pub static_dir: Option<String>,
    /// Largest accepted audio upload in bytes
    pub max_audio_bytes: Option<usize>,
    /// Evict sessions idle this long; 0 disables eviction
    pub session_ttl_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoxchatConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file() -> VoxchatConfigFile {
    config_file_path().map_or_else(VoxchatConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
#[must_use]
pub fn load_from(path: &Path) -> VoxchatConfigFile {
    if !path.exists() {
        return VoxchatConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoxchatConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoxchatConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voxchat/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voxchat").join("config.toml"))
}
