use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - please edit it with your session cookie and restart.")]
    ConfigNotFound { path: PathBuf },

    #[error("Missing required config field: {field}")]
    ConfigMissingField { field: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Provider API errors
    #[error("Provider API returned an error: {code}")]
    Api { code: String },

    #[error("Failed to decode API response: {reason}")]
    Decode { reason: String },

    #[error("No suitable schedule found for a user program")]
    NoSuitableSchedule,

    #[error("No active program is loaded")]
    NoActiveProgram,

    // Message stream errors
    #[error("Chat transport failed: {reason}")]
    Transport { reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // Network errors
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP client error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
