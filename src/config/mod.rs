//! Configuration management for the tutor gateway
//!
//! Values resolve as environment variable, then config file, then default.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::chat::budget::{DEFAULT_KEEP_MESSAGES, DEFAULT_TOKEN_THRESHOLD};
use crate::chat::{DEFAULT_COMPLETION_TIMEOUT, store};
use crate::completion::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::{Error, Result};

use file::TutorConfigFile;

/// Default API port
pub const DEFAULT_PORT: u16 = 5000;

/// Tutor gateway configuration
#[derive(Debug)]
pub struct Config {
    /// Path to data directory (database)
    pub data_dir: PathBuf,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Completion API configuration
    pub llm: LlmConfig,

    /// Conversation budget and session limits
    pub chat: ChatConfig,

    /// Token verification
    pub auth: AuthConfig,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub port: u16,
}

/// Completion API configuration
#[derive(Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

/// Conversation budget and session limits
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub token_threshold: usize,
    pub keep_messages: usize,
    pub session_ttl: Duration,
    pub max_sessions: u64,
    /// Per-user chat requests per minute; `None` disables limiting
    pub requests_per_minute: Option<u32>,
}

/// Token verification
#[derive(Debug)]
pub struct AuthConfig {
    pub jwt_secret: Option<SecretString>,
    pub issuer: Option<String>,
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be created
    pub fn load() -> Result<Self> {
        let config = Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok());
        std::fs::create_dir_all(&config.data_dir)?;
        Ok(config)
    }

    /// Resolve configuration from a parsed file and an environment lookup
    #[must_use]
    pub fn from_sources(fc: TutorConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = env("TUTOR_DATA_DIR")
            .or(fc.server.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        let api_server = ApiServerConfig {
            port: parse_env(&env, "TUTOR_PORT")
                .or_else(|| parse_env(&env, "PORT"))
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
        };

        let llm = LlmConfig {
            base_url: env("DEEPSEEK_API_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: env("TUTOR_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: env("DEEPSEEK_API_KEY")
                .or(fc.llm.api_key)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            timeout: parse_env(&env, "TUTOR_LLM_TIMEOUT_SECS")
                .or(fc.llm.timeout_secs)
                .map_or(DEFAULT_COMPLETION_TIMEOUT, Duration::from_secs),
        };

        let chat = ChatConfig {
            token_threshold: parse_env(&env, "TUTOR_TOKEN_THRESHOLD")
                .or(fc.chat.token_threshold)
                .and_then(|v| nonzero("token_threshold", v))
                .unwrap_or(DEFAULT_TOKEN_THRESHOLD),
            keep_messages: parse_env(&env, "TUTOR_KEEP_MESSAGES")
                .or(fc.chat.keep_messages)
                .and_then(|v| nonzero("keep_messages", v))
                .unwrap_or(DEFAULT_KEEP_MESSAGES),
            session_ttl: parse_env(&env, "TUTOR_SESSION_TTL_SECS")
                .or(fc.chat.session_ttl_secs)
                .map_or(store::DEFAULT_SESSION_TTL, Duration::from_secs),
            max_sessions: parse_env(&env, "TUTOR_MAX_SESSIONS")
                .or(fc.chat.max_sessions)
                .and_then(|v| nonzero("max_sessions", v))
                .unwrap_or(store::DEFAULT_MAX_SESSIONS),
            requests_per_minute: parse_env(&env, "TUTOR_CHAT_RPM")
                .or(fc.chat.requests_per_minute)
                .filter(|rpm| *rpm > 0),
        };

        let auth = AuthConfig {
            jwt_secret: env("TUTOR_JWT_SECRET")
                .or(fc.auth.jwt_secret)
                .filter(|s| !s.is_empty())
                .map(SecretString::from),
            issuer: env("TUTOR_JWT_ISSUER").or(fc.auth.issuer),
        };

        Self {
            data_dir,
            api_server,
            llm,
            chat,
            auth,
        }
    }

    /// Path of the `SQLite` database
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("tutor.db")
    }

    /// Completion API key, required to serve chat
    ///
    /// # Errors
    ///
    /// Returns error if no key is configured
    pub fn require_api_key(&self) -> Result<&SecretString> {
        self.llm
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("DEEPSEEK_API_KEY is not set".to_string()))
    }

    /// JWT secret, required to verify or mint tokens
    ///
    /// # Errors
    ///
    /// Returns error if no secret is configured
    pub fn require_jwt_secret(&self) -> Result<&SecretString> {
        self.auth
            .jwt_secret
            .as_ref()
            .ok_or_else(|| Error::Config("TUTOR_JWT_SECRET is not set".to_string()))
    }
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("tutor"))
}

fn parse_env<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

/// Zero would empty every history; fall back to the default instead
fn nonzero<T: Default + PartialEq + Copy>(key: &str, value: T) -> Option<T> {
    if value == T::default() {
        tracing::warn!(key, "ignoring zero chat setting, using default");
        return None;
    }
    Some(value)
}
