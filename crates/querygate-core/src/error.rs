//! Error types for QueryGate

use thiserror::Error;

/// Core error type for QueryGate operations
#[derive(Error, Debug)]
pub enum QueryGateError {
    #[error("Connection error: {0}")]
    Connection(String),

    /// Backing-store reported failure. The message is kept verbatim.
    #[error("{0}")]
    Query(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for QueryGate operations
pub type Result<T> = std::result::Result<T, QueryGateError>;
