//! TOML configuration file loading
//!
//! Supports `~/.config/tutor/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct TutorConfigFile {
    #[serde(default)]
    pub server: ServerFileConfig,

    #[serde(default)]
    pub llm: LlmFileConfig,

    #[serde(default)]
    pub chat: ChatFileConfig,

    #[serde(default)]
    pub auth: AuthFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    pub data_dir: Option<String>,
}

/// Completion API configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    /// Completion timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Conversation budget and session limits
#[derive(Debug, Default, Deserialize)]
pub struct ChatFileConfig {
    pub token_threshold: Option<usize>,
    pub keep_messages: Option<usize>,
    pub session_ttl_secs: Option<u64>,
    pub max_sessions: Option<u64>,
    pub requests_per_minute: Option<u32>,
}

/// Token verification
#[derive(Debug, Default, Deserialize)]
pub struct AuthFileConfig {
    pub jwt_secret: Option<String>,
    pub issuer: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `TutorConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> TutorConfigFile {
    config_file_path().map_or_else(TutorConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
pub fn load_from(path: &Path) -> TutorConfigFile {
    if !path.exists() {
        return TutorConfigFile::default();
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
                TutorConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read config file");
            TutorConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/tutor/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("tutor").join("config.toml"))
}
