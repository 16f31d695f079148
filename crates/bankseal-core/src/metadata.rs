//! Host metadata contract.
//!
//! The hosting pipeline owns the message context; the codec only needs
//! get/set-by-name-and-namespace semantics, so that is the whole trait.

use std::collections::HashMap;

/// Well-known metadata keys exchanged with the hosting layer.
pub mod keys {
    /// Namespace every key below lives in.
    pub const NS: &str = "urn:bankseal:properties";

    // Consumed by the pipelines.
    pub const INTERCHANGE_ID: &str = "InterchangeID";
    pub const RECEIVED_FILE_NAME: &str = "ReceivedFileName";
    pub const SOURCE_PARTY: &str = "SourceParty";
    pub const SOURCE_PARTY_ID: &str = "SourcePartyID";
    pub const SIGNATURE_CERTIFICATE: &str = "SignatureCertificate";

    // Produced by the pipelines.
    pub const MESSAGE_TYPE: &str = "MessageType";
    pub const RESPONSE_CODE: &str = "ResponseCode";
    pub const RESPONSE_TEXT: &str = "ResponseText";
    pub const EXECUTION_SERIAL: &str = "ExecutionSerial";
    pub const SIGNER_ID: &str = "SignerId";
    pub const DESTINATION_PARTY: &str = "DestinationParty";
}

/// Read/write access to the host's key/value metadata bag.
pub trait MetadataBag {
    fn get(&self, name: &str, namespace: &str) -> Option<String>;
    fn set(&mut self, name: &str, namespace: &str, value: String);
}

/// In-memory metadata bag for tests and embedding hosts.
#[derive(Debug, Default)]
pub struct MemoryMetadata {
    entries: HashMap<(String, String), String>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience accessor for keys in the well-known namespace.
    pub fn get_known(&self, name: &str) -> Option<String> {
        self.get(name, keys::NS)
    }

    /// Convenience setter for keys in the well-known namespace.
    pub fn set_known(&mut self, name: &str, value: impl Into<String>) {
        self.set(name, keys::NS, value.into());
    }
}

impl MetadataBag for MemoryMetadata {
    fn get(&self, name: &str, namespace: &str) -> Option<String> {
        self.entries
            .get(&(name.to_string(), namespace.to_string()))
            .cloned()
    }

    fn set(&mut self, name: &str, namespace: &str, value: String) {
        self.entries
            .insert((name.to_string(), namespace.to_string()), value);
    }
}
