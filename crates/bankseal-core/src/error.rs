//! Error types for the bankseal core.

use thiserror::Error;

/// Core errors that can occur while building or dismantling an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("unsupported compression: {0}")]
    UnsupportedCompression(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, EnvelopeError>;
