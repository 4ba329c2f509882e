//! Error types for the radio player

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No tokio runtime: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

/// Audio output and transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("No source attached")]
    NotAttached,

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Playback rejected: {0}")]
    PlayRejected(String),
}

/// Connect-sequence failure classes.
///
/// These drive state transitions and log lines; consumers only ever see the
/// resulting status and message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Endpoint {index} unavailable: {reason}")]
    EndpointUnavailable { index: usize, reason: String },

    #[error("All {count} endpoints exhausted")]
    AllEndpointsExhausted { count: usize },

    #[error("Retry budget exhausted")]
    RetryBudgetExhausted,

    #[error("Network offline")]
    OfflineDetected,
}

/// Host platform feature errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("{0} not supported on this platform")]
    Unsupported(&'static str),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Stream endpoint list is empty")]
    NoEndpoints,

    #[error("Invalid endpoint URI {uri}: {reason}")]
    InvalidEndpoint { uri: String, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
