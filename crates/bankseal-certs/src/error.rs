//! Error types for certificate resolution.

use thiserror::Error;

/// Errors from certificate parsing and trust-store resolution.
#[derive(Debug, Error)]
pub enum CertError {
    /// No certificate survived the lookup (including a failed CN check).
    #[error("certificate not found: {query}")]
    NotFound { query: String },

    #[error("certificate parse error: {0}")]
    Parse(String),

    #[error("trust store error: {0}")]
    Store(String),
}

/// Result type for certificate operations.
pub type Result<T> = std::result::Result<T, CertError>;
