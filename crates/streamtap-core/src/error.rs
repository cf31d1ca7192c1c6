//! Error types for streamtap core library.

use thiserror::Error;

/// Result type alias using streamtap Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for streamtap operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Envelope line could not be decoded
    #[error("Failed to decode envelope: {0}")]
    EnvelopeDecode(String),

    /// Envelope line exceeds the configured size limit
    #[error("Envelope too large: {len} bytes (max {max})")]
    EnvelopeTooLarge { len: usize, max: usize },

    /// Schema string is malformed
    #[error("Invalid schema at offset {offset}: {message}")]
    Schema { offset: usize, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
