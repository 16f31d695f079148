//! # Bankseal Core
//!
//! Pure primitives for the bankseal secure envelope: the field schema, its
//! XML representation and canonical serialization, the streaming content
//! codec, and ExecutionSerial correlation tokens.
//!
//! This crate contains no cryptography and no trust-store access. It is
//! pure computation over the envelope representation.
//!
//! ## Key Types
//!
//! - [`Envelope`] - The outbound field set and its XML rendering
//! - [`MessageType`] - Root namespace + name, the host's routing hint
//! - [`EncodeConfig`] / [`DecodeConfig`] - Typed pipeline configuration
//! - [`MetadataBag`] - The host metadata read/write contract
//!
//! ## Canonicalization
//!
//! Documents are serialized in exclusive canonical form. See [`xml`].

pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod metadata;
pub mod serial;
pub mod xml;

pub use config::{DecodeConfig, EncodeConfig, TrustPolicy};
pub use envelope::{Envelope, MessageType, ENVELOPE_NS};
pub use error::EnvelopeError;
pub use metadata::{keys, MemoryMetadata, MetadataBag};
pub use xml::{canonical_bytes, Element, Node, XMLDSIG_NS};
