//! The envelope field schema and its XML representation.

use std::fmt;

use chrono::Local;

use crate::xml::Element;

/// Namespace of the envelope document family.
pub const ENVELOPE_NS: &str = "http://bxd.fi/xmldata/";

/// Root element of an outbound envelope.
pub const REQUEST_ROOT: &str = "ApplicationRequest";

/// The fixed command literal carried by every upload envelope.
pub const COMMAND_UPLOAD: &str = "UPLOADFILE";

/// The only supported compression method literal.
pub const COMPRESSION_METHOD_GZIP: &str = "GZIP";

/// Element names of the envelope schema. The decode side recognizes a
/// superset: response envelopes carry `Compressed` where the request side
/// writes `Compression`, plus the fault and correlation fields.
pub mod fields {
    pub const CUSTOMER_ID: &str = "CustomerId";
    pub const COMMAND: &str = "Command";
    pub const TIMESTAMP: &str = "Timestamp";
    pub const ENVIRONMENT: &str = "Environment";
    pub const USER_FILENAME: &str = "UserFilename";
    pub const TARGET_ID: &str = "TargetId";
    pub const EXECUTION_SERIAL: &str = "ExecutionSerial";
    pub const COMPRESSION: &str = "Compression";
    pub const COMPRESSED: &str = "Compressed";
    pub const COMPRESSION_METHOD: &str = "CompressionMethod";
    pub const SOFTWARE_ID: &str = "SoftwareId";
    pub const FILE_TYPE: &str = "FileType";
    pub const CONTENT: &str = "Content";
    pub const RESPONSE_CODE: &str = "ResponseCode";
    pub const RESPONSE_TEXT: &str = "ResponseText";
    pub const PARENT_FILE_REFERENCE: &str = "ParentFileReference";
    pub const SIGNATURE: &str = "Signature";
}

/// An outbound envelope, fully populated and ready to render.
///
/// Created fresh per encode call and consumed within it.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub customer_id: u64,
    pub timestamp: String,
    pub environment: String,
    pub user_filename: String,
    pub target_id: String,
    pub execution_serial: String,
    pub compression: bool,
    pub software_id: String,
    pub file_type: String,
    /// Base64 text of the (possibly compressed) payload.
    pub content: String,
}

impl Envelope {
    /// Render the fixed-order field set into the XML document tree.
    ///
    /// Text values are stored raw; the serializer escapes them.
    pub fn to_document(&self) -> Element {
        Element::new(REQUEST_ROOT, Some(ENVELOPE_NS))
            .child(leaf(fields::CUSTOMER_ID, &self.customer_id.to_string()))
            .child(leaf(fields::COMMAND, COMMAND_UPLOAD))
            .child(leaf(fields::TIMESTAMP, &self.timestamp))
            .child(leaf(fields::ENVIRONMENT, &self.environment))
            .child(leaf(fields::USER_FILENAME, &self.user_filename))
            .child(leaf(fields::TARGET_ID, &self.target_id))
            .child(leaf(fields::EXECUTION_SERIAL, &self.execution_serial))
            .child(leaf(
                fields::COMPRESSION,
                if self.compression { "true" } else { "false" },
            ))
            .child(leaf(fields::COMPRESSION_METHOD, COMPRESSION_METHOD_GZIP))
            .child(leaf(fields::SOFTWARE_ID, &self.software_id))
            .child(leaf(fields::FILE_TYPE, &self.file_type))
            .child(leaf(fields::CONTENT, &self.content))
    }
}

fn leaf(name: &str, text: &str) -> Element {
    Element::new(name, Some(ENVELOPE_NS)).text(text)
}

/// Current local time in the envelope timestamp format.
pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string()
}

/// A message type: the namespace and local name of a document root,
/// used as a routing hint by the hosting layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageType {
    pub namespace: Option<String>,
    pub name: String,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}#{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
