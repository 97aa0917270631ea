use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum KindleError {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Daemon is already running (PID: {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("Daemon is not running")]
    NotRunning,

    #[error("Bookmark source {source_name} is unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("Failed to persist processed state: {0}")]
    StatePersistence(String),

    #[error("Bookmark source already registered: {0}")]
    DuplicateSource(String),

    #[error("Bookmark source not found: {0}")]
    SourceNotFound(String),

    #[error("Invalid configuration for source {source_name}: {reason}")]
    InvalidSourceConfig { source_name: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, KindleError>;
