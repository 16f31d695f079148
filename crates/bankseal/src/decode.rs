//! Decode pipeline: parse, optionally verify, extract fault metadata,
//! recover the payload.
//!
//! Field extraction is a single forward scan over the root's children,
//! driven by a transition table of recognized element names. Unknown or
//! reordered elements are skipped, because optional fields come and go
//! across envelope versions and fault cases.

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;

use bankseal_certs::CertificateResolver;
use bankseal_core::envelope::fields;
use bankseal_core::xml::{Element, Node};
use bankseal_core::{codec, serial, xml};
use bankseal_core::{keys, DecodeConfig, EnvelopeError, MessageType, MetadataBag};

use crate::error::Result;
use crate::signature::{self, VerifyOptions};

/// Metadata recovered from the envelope, also published to the host bag.
#[derive(Debug, Clone, Default)]
pub struct DecodeMetadata {
    pub message_type: Option<MessageType>,
    pub response_code: i32,
    pub response_text: String,
    pub execution_serial: Option<String>,
    pub signer_id: Option<String>,
}

/// What the pipeline hands back to the caller.
#[derive(Debug)]
pub enum DecodeOutcome {
    /// The payload was recovered; the cursor is at position 0.
    Decoded {
        payload: Cursor<Vec<u8>>,
        metadata: DecodeMetadata,
    },
    /// The caller's original stream, rewound to 0, stands as the result.
    PassThrough { metadata: DecodeMetadata },
}

/// The decode pipeline. One instance per configuration; `execute` is
/// invoked once per message.
pub struct Decoder {
    config: DecodeConfig,
    resolver: Option<Arc<CertificateResolver>>,
}

impl Decoder {
    pub fn new(config: DecodeConfig) -> Self {
        Self {
            config,
            resolver: None,
        }
    }

    /// Attach the trust-store resolver required by the store trust policy.
    pub fn with_resolver(config: DecodeConfig, resolver: Arc<CertificateResolver>) -> Self {
        Self {
            config,
            resolver: Some(resolver),
        }
    }

    /// Run the pipeline over one envelope stream.
    ///
    /// The input is always left rewound to position 0, so every
    /// pass-through and error path hands the caller back an untouched
    /// stream.
    pub fn execute(
        &self,
        input: &mut (impl Read + Seek),
        host: &mut dyn MetadataBag,
    ) -> Result<DecodeOutcome> {
        let interchange = host
            .get(keys::INTERCHANGE_ID, keys::NS)
            .unwrap_or_default();
        let _span = tracing::info_span!("decode", interchange = %interchange).entered();

        if self.config.disable {
            tracing::debug!("decode disabled, passing message through");
            input.seek(SeekFrom::Start(0))?;
            return Ok(DecodeOutcome::PassThrough {
                metadata: DecodeMetadata::default(),
            });
        }

        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        input.seek(SeekFrom::Start(0))?;

        let root = xml::parse_bytes(&bytes)?;
        let mut metadata = DecodeMetadata {
            message_type: Some(MessageType {
                namespace: root.namespace.clone(),
                name: root.name.clone(),
            }),
            ..DecodeMetadata::default()
        };

        if self.config.verify {
            let options = VerifyOptions {
                trust: self.config.trust,
                thumbprint: self.config.thumbprint.clone(),
                previous_thumbprint: self.config.previous_thumbprint.clone(),
            };
            if let Err(err) = signature::verify(&root, &options, self.resolver.as_deref()) {
                tracing::warn!(error = %err, "envelope signature verification failed");
                if !self.config.pass_thru {
                    return Err(err);
                }
                metadata.response_code = -1;
                metadata.response_text = err.to_string();
                publish(host, &metadata);
                return Ok(DecodeOutcome::PassThrough { metadata });
            }
        }

        let scanned = FieldScanner::scan(&root)?;
        metadata.response_code = scanned.response_code;
        metadata.response_text = scanned.response_text.clone().unwrap_or_default();
        metadata.execution_serial = scanned.execution_serial.clone();
        metadata.signer_id = derive_signer(&scanned);
        publish(host, &metadata);

        // A fault response carries no payload worth decoding when the
        // caller asked for pass-through.
        if scanned.state == ScanState::FaultDetected && self.config.pass_thru {
            tracing::debug!(
                response_code = scanned.response_code,
                "fault response, passing original message through"
            );
            return Ok(DecodeOutcome::PassThrough { metadata });
        }

        let content = scanned.content.ok_or_else(|| {
            EnvelopeError::MalformedEnvelope("Content element is missing".to_string())
        })?;
        let compact: Vec<u8> = content
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        let payload = codec::decode(compact.as_slice(), scanned.compressed)?;

        // The content's own root supersedes the envelope's as the routing
        // hint; non-XML payloads keep the envelope type.
        if let Ok(inner) = xml::parse_bytes(payload.get_ref()) {
            metadata.message_type = Some(MessageType {
                namespace: inner.namespace,
                name: inner.name,
            });
            publish(host, &metadata);
        }

        Ok(DecodeOutcome::Decoded { payload, metadata })
    }
}

fn derive_signer(scanned: &ScannedFields) -> Option<String> {
    if let Some(id) = scanned
        .execution_serial
        .as_deref()
        .and_then(serial::legacy_target_id)
    {
        return Some(id);
    }
    scanned
        .parent_file_reference
        .clone()
        .filter(|reference| reference.len() > 1)
}

fn publish(host: &mut dyn MetadataBag, metadata: &DecodeMetadata) {
    if let Some(message_type) = &metadata.message_type {
        host.set(keys::MESSAGE_TYPE, keys::NS, message_type.to_string());
    }
    host.set(
        keys::RESPONSE_CODE,
        keys::NS,
        metadata.response_code.to_string(),
    );
    host.set(keys::RESPONSE_TEXT, keys::NS, metadata.response_text.clone());
    if let Some(serial) = &metadata.execution_serial {
        host.set(keys::EXECUTION_SERIAL, keys::NS, serial.clone());
    }
    if let Some(signer) = &metadata.signer_id {
        host.set(keys::SIGNER_ID, keys::NS, signer.clone());
        host.set(keys::DESTINATION_PARTY, keys::NS, signer.clone());
    }
}

/// Scanner states. `FaultDetected` and `ExtractingContent` only record
/// what the scan saw; the pipeline decides what to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    ScanningFields,
    FaultDetected,
    ExtractingContent,
}

/// The transition table: recognized element names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    ResponseCode,
    ResponseText,
    ExecutionSerial,
    Compressed,
    ParentFileReference,
    Content,
}

impl FieldKind {
    fn recognize(name: &str) -> Option<Self> {
        match name {
            fields::RESPONSE_CODE => Some(Self::ResponseCode),
            fields::RESPONSE_TEXT => Some(Self::ResponseText),
            fields::EXECUTION_SERIAL => Some(Self::ExecutionSerial),
            // Response envelopes write `Compressed`; request envelopes
            // write `Compression`. Both mark gzip content.
            fields::COMPRESSED | fields::COMPRESSION => Some(Self::Compressed),
            fields::PARENT_FILE_REFERENCE => Some(Self::ParentFileReference),
            fields::CONTENT => Some(Self::Content),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct ScannedFields {
    state: ScanState,
    response_code: i32,
    response_text: Option<String>,
    execution_serial: Option<String>,
    compressed: bool,
    parent_file_reference: Option<String>,
    content: Option<String>,
}

impl Default for ScannedFields {
    fn default() -> Self {
        Self {
            state: ScanState::ScanningFields,
            response_code: 0,
            response_text: None,
            execution_serial: None,
            compressed: false,
            parent_file_reference: None,
            content: None,
        }
    }
}

struct FieldScanner;

impl FieldScanner {
    /// One forward pass over the root's direct children.
    fn scan(root: &Element) -> Result<ScannedFields> {
        let mut fields = ScannedFields::default();

        for node in &root.children {
            let element = match node {
                Node::Element(el) => el,
                Node::Text(_) => continue,
            };
            let kind = match FieldKind::recognize(&element.name) {
                Some(kind) => kind,
                None => continue,
            };
            let text = element.text_content();
            match kind {
                FieldKind::ResponseCode => {
                    fields.response_code = text.trim().parse().map_err(|_| {
                        EnvelopeError::MalformedEnvelope(format!(
                            "ResponseCode is not an integer: {text}"
                        ))
                    })?;
                    if fields.response_code != 0 {
                        fields.state = ScanState::FaultDetected;
                    }
                }
                FieldKind::ResponseText => fields.response_text = Some(text),
                FieldKind::ExecutionSerial => fields.execution_serial = Some(text),
                FieldKind::Compressed => {
                    fields.compressed = text.trim().eq_ignore_ascii_case("true") || text.trim() == "1";
                }
                FieldKind::ParentFileReference => fields.parent_file_reference = Some(text),
                FieldKind::Content => {
                    fields.content = Some(text);
                    if fields.state == ScanState::ScanningFields {
                        fields.state = ScanState::ExtractingContent;
                    }
                }
            }
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankseal_core::ENVELOPE_NS;

    fn leaf(name: &str, text: &str) -> Element {
        Element::new(name, Some(ENVELOPE_NS)).text(text)
    }

    #[test]
    fn test_scan_tolerates_unknown_and_reordered_elements() {
        let root = Element::new("ApplicationResponse", Some(ENVELOPE_NS))
            .child(leaf("Mystery", "x"))
            .child(leaf("Content", "aGVsbG8="))
            .child(leaf("Compressed", "false"))
            .child(leaf("ResponseCode", "0"));
        let fields = FieldScanner::scan(&root).unwrap();
        assert_eq!(fields.response_code, 0);
        assert_eq!(fields.content.as_deref(), Some("aGVsbG8="));
        assert!(!fields.compressed);
        assert_eq!(fields.state, ScanState::ExtractingContent);
    }

    #[test]
    fn test_fault_state_sticks_even_when_content_follows() {
        let root = Element::new("ApplicationResponse", Some(ENVELOPE_NS))
            .child(leaf("ResponseCode", "5"))
            .child(leaf("ResponseText", "Invalid file"))
            .child(leaf("Content", "aGVsbG8="));
        let fields = FieldScanner::scan(&root).unwrap();
        assert_eq!(fields.state, ScanState::FaultDetected);
        assert_eq!(fields.response_text.as_deref(), Some("Invalid file"));
    }

    #[test]
    fn test_scan_accepts_both_compression_spellings() {
        for name in ["Compressed", "Compression"] {
            let root = Element::new("ApplicationResponse", Some(ENVELOPE_NS))
                .child(leaf(name, "true"));
            assert!(FieldScanner::scan(&root).unwrap().compressed, "{name}");
        }
    }

    #[test]
    fn test_scan_rejects_non_numeric_response_code() {
        let root = Element::new("ApplicationResponse", Some(ENVELOPE_NS))
            .child(leaf("ResponseCode", "oops"));
        assert!(FieldScanner::scan(&root).is_err());
    }

    #[test]
    fn test_signer_from_legacy_serial_beats_parent_reference() {
        let scanned = ScannedFields {
            execution_serial: Some("20240307142213165123000000000042".to_string()),
            parent_file_reference: Some("999".to_string()),
            ..ScannedFields::default()
        };
        assert_eq!(derive_signer(&scanned).as_deref(), Some("42"));
    }

    #[test]
    fn test_signer_falls_back_to_nontrivial_parent_reference() {
        let scanned = ScannedFields {
            execution_serial: Some("short".to_string()),
            parent_file_reference: Some("12345".to_string()),
            ..ScannedFields::default()
        };
        assert_eq!(derive_signer(&scanned).as_deref(), Some("12345"));

        let trivial = ScannedFields {
            parent_file_reference: Some("0".to_string()),
            ..ScannedFields::default()
        };
        assert_eq!(derive_signer(&trivial), None);
    }
}
