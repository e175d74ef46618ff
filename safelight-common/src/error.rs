//! Common error types for Safelight

use thiserror::Error;

/// Common result type for Safelight operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the host and by compute modules
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A wire payload did not have the expected shape
    #[error("Invalid wire payload: {0}")]
    InvalidWire(String),
}
