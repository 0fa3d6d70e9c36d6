// ABOUTME: Defines all error types for the textcast library using thiserror.
// ABOUTME: Each submodule has its own error enum, unified under TextcastError.

use std::path::PathBuf;

/// Top-level error type for the textcast library.
#[derive(Debug, thiserror::Error)]
pub enum TextcastError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Send error: {0}")]
    Send(#[from] SendError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

/// Errors raised while constructing a target. Nothing invalid is ever sent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid phone number '{0}' (expected '+' followed by 7-15 digits)")]
    InvalidPhone(String),

    #[error("message is empty")]
    EmptyMessage,

    #[error("message is {len} characters, limit is {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("repeat count must be at least 1")]
    ZeroCount,

    #[error("delay must be a non-negative number of seconds, got {0}")]
    InvalidDelay(f64),
}

/// Errors from a single send attempt.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl SendError {
    /// Whether the failure is transient and the attempt may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SendError::Timeout | SendError::Connection(_) => true,
            SendError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            SendError::Decode(_) | SendError::Other(_) => false,
        }
    }
}

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("environment variable {var} has invalid value '{value}'")]
    Env { var: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors from reading a target file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("target file not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
