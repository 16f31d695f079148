//! # Bankseal Certs
//!
//! X.509 certificate handling for the bankseal secure envelope: the
//! parsed [`Certificate`] model, the [`TrustStore`] lookup abstraction,
//! and the caching [`CertificateResolver`].
//!
//! Thumbprints are SHA-1 over the DER encoding, compared after
//! normalization (case and separators ignored) so operator-pasted values
//! with colons or spaces match.

pub mod certificate;
pub mod error;
pub mod resolver;
pub mod store;

pub use certificate::{normalize_thumbprint, Certificate};
pub use error::CertError;
pub use resolver::CertificateResolver;
pub use store::{MemoryTrustStore, TrustStore};
