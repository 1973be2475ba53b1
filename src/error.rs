//! Error types for the tutor gateway

use thiserror::Error;

/// Result type alias for tutor gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the tutor gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or empty required input
    #[error("validation error: {0}")]
    Validation(String),

    /// Completion call failed, timed out or returned malformed data
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Interaction log write failed
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Token missing or rejected by the identity provider
    #[error("auth error: {0}")]
    Auth(String),

    /// Authenticated but not allowed
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
