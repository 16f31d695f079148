//! # Bankseal
//!
//! Secure envelope codec for exchanging files with a banking counterparty.
//! A producer wraps a payload (optionally gzip-compressed, always
//! base64-encoded) inside a signed XML envelope carrying routing and
//! correlation metadata; a consumer parses that envelope, optionally
//! verifies the enveloped signature, extracts fault metadata, and recovers
//! the original payload.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::io::Cursor;
//! use std::sync::Arc;
//!
//! use bankseal::certs::{CertificateResolver, MemoryTrustStore};
//! use bankseal::core::{DecodeConfig, EncodeConfig, MemoryMetadata};
//! use bankseal::{Decoder, Encoder};
//!
//! # fn certificates() -> Vec<bankseal::certs::Certificate> { vec![] }
//! let store = Arc::new(MemoryTrustStore::new(certificates()));
//! let resolver = Arc::new(CertificateResolver::new(store));
//!
//! let encoder = Encoder::new(
//!     EncodeConfig {
//!         customer_id: 7723525704,
//!         environment: "PRODUCTION".into(),
//!         target_id: Some("123456789012".into()),
//!         compress: true,
//!         certificate_thumbprint: Some("aa:bb:cc".into()),
//!         ..EncodeConfig::default()
//!     },
//!     resolver,
//! );
//! let mut host = MemoryMetadata::new();
//! let envelope = encoder.execute(b"<Payment/>", &mut host)?;
//!
//! let decoder = Decoder::new(DecodeConfig {
//!     verify: true,
//!     ..DecodeConfig::default()
//! });
//! let outcome = decoder.execute(&mut Cursor::new(envelope.into_inner()), &mut host)?;
//! # Ok::<(), bankseal::SealError>(())
//! ```

pub mod decode;
pub mod encode;
pub mod error;
pub mod signature;

pub use bankseal_certs as certs;
pub use bankseal_core as core;

pub use decode::{DecodeMetadata, DecodeOutcome, Decoder};
pub use encode::Encoder;
pub use error::{Result, SealError};
pub use signature::{sign, verify, VerifyOptions};
