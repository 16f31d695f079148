//! # Bankseal Testkit
//!
//! Shared fixtures for the bankseal test suites: pre-generated signing
//! identities and a builder for counterparty response envelopes, plus
//! proptest generators.
//!
//! Everything here is test support; `expect` is used freely.

pub mod fixtures;
pub mod generators;

pub use fixtures::{ResponseEnvelope, TestIdentity};
