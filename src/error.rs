//! Error types for the recorder

use thiserror::Error;

/// Recorder errors
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Failed to parse message: {0}")]
    ParseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),
}

impl RecorderError {
    /// Whether this error came from decoding a feed message
    pub fn is_parse(&self) -> bool {
        matches!(self, RecorderError::ParseError(_))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RecorderError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RecorderError::ConnectionError(err.to_string())
    }
}

impl From<serde_json::Error> for RecorderError {
    fn from(err: serde_json::Error) -> Self {
        RecorderError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for RecorderError {
    fn from(err: std::io::Error) -> Self {
        RecorderError::StorageError(err.to_string())
    }
}

impl From<prometheus::Error> for RecorderError {
    fn from(err: prometheus::Error) -> Self {
        RecorderError::MetricsError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RecorderError>;
