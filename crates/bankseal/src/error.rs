//! Pipeline-level error type.

use thiserror::Error;

/// Errors from the encode/decode pipelines and the signature engine.
#[derive(Debug, Error)]
pub enum SealError {
    /// The document carries no `Signature` element.
    #[error("document has no Signature element")]
    SignatureElementMissing,

    /// The signature or document digest failed verification.
    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    /// A certificate was found but cannot be used as required (no embedded
    /// certificate, or no private key for signing).
    #[error("certificate unavailable: {0}")]
    CertificateUnavailable(String),

    /// No certificate source produced a usable certificate.
    #[error("certificate unresolved: {0}")]
    CertificateUnresolved(String),

    /// RSA signing failed.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error(transparent)]
    Envelope(#[from] bankseal_core::EnvelopeError),

    #[error(transparent)]
    Certificate(#[from] bankseal_certs::CertError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, SealError>;
