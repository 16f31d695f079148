//! Encode pipeline: resolve the signing certificate, build the envelope
//! around the encoded payload, sign, serialize.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use bankseal_certs::{Certificate, CertificateResolver};
use bankseal_core::envelope::{timestamp_now, Envelope};
use bankseal_core::{codec, serial, xml};
use bankseal_core::{keys, EncodeConfig, EnvelopeError, MetadataBag};

use crate::error::{Result, SealError};
use crate::signature;

/// The encode pipeline. One instance per configuration; `execute` is
/// invoked once per message.
pub struct Encoder {
    config: EncodeConfig,
    resolver: Arc<CertificateResolver>,
}

impl Encoder {
    pub fn new(config: EncodeConfig, resolver: Arc<CertificateResolver>) -> Self {
        Self { config, resolver }
    }

    /// Wrap one payload into a signed envelope.
    ///
    /// The returned cursor is positioned at the start. With `disable` set
    /// the payload passes through untouched.
    pub fn execute(
        &self,
        payload: &[u8],
        host: &mut dyn MetadataBag,
    ) -> Result<Cursor<Vec<u8>>> {
        let interchange = host
            .get(keys::INTERCHANGE_ID, keys::NS)
            .unwrap_or_default();
        let _span = tracing::info_span!("encode", interchange = %interchange).entered();

        if self.config.disable {
            tracing::debug!("encode disabled, passing message through");
            return Ok(Cursor::new(payload.to_vec()));
        }

        let certificate = self.resolve_certificate(host)?;
        let target_id = match &self.config.target_id {
            Some(id) => id.clone(),
            None => certificate
                .subject_serial_number()
                .map(str::to_string)
                .ok_or_else(|| {
                    EnvelopeError::InvalidConfig(
                        "no TargetId configured and the certificate subject has no SERIALNUMBER"
                            .to_string(),
                    )
                })?,
        };

        let execution_serial = serial::generate(&target_id, self.config.internal_target_id)?;
        let content = codec::encode(payload, self.config.compress)?;

        let envelope = Envelope {
            customer_id: self.config.customer_id,
            timestamp: timestamp_now(),
            environment: self.config.environment.clone(),
            user_filename: self.user_filename(host),
            target_id,
            execution_serial: execution_serial.clone(),
            compression: self.config.compress,
            software_id: self.config.software_id.clone(),
            file_type: self.config.file_type.clone(),
            content,
        };

        let mut document = envelope.to_document();
        signature::sign(&mut document, &certificate)?;

        host.set(keys::EXECUTION_SERIAL, keys::NS, execution_serial);
        tracing::debug!(
            target_id = %envelope.target_id,
            compressed = envelope.compression,
            "envelope signed"
        );
        Ok(Cursor::new(xml::to_document_bytes(&document)))
    }

    /// Certificate resolution order: configured thumbprint, then the
    /// host-supplied certificate thumbprint, then (only when no target id
    /// is configured) a serial-number lookup on the host's source party id.
    fn resolve_certificate(&self, host: &dyn MetadataBag) -> Result<Certificate> {
        if let Some(thumbprint) = &self.config.certificate_thumbprint {
            return Ok((*self.resolver.resolve_by_thumbprint(thumbprint)?).clone());
        }
        if let Some(thumbprint) = host.get(keys::SIGNATURE_CERTIFICATE, keys::NS) {
            return Ok((*self.resolver.resolve_by_thumbprint(&thumbprint)?).clone());
        }
        if self.config.target_id.is_none() {
            if let Some(party_serial) = host.get(keys::SOURCE_PARTY_ID, keys::NS) {
                let resolved = self
                    .resolver
                    .resolve_by_serial(&party_serial, self.config.certificate_cn.as_deref())?;
                return Ok((*resolved).clone());
            }
        }
        Err(SealError::CertificateUnresolved(
            "no certificate thumbprint or source party configured".to_string(),
        ))
    }

    /// `UserFilename` comes from the host's received file name, stripped
    /// to its base name, with the configured value as fallback.
    fn user_filename(&self, host: &dyn MetadataBag) -> String {
        host.get(keys::RECEIVED_FILE_NAME, keys::NS)
            .and_then(|received| {
                Path::new(&received)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .or_else(|| self.config.user_filename.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankseal_certs::MemoryTrustStore;
    use bankseal_core::MemoryMetadata;
    use bankseal_testkit::fixtures::TestIdentity;

    fn encoder(config: EncodeConfig) -> Encoder {
        let signer = TestIdentity::signer();
        let store = MemoryTrustStore::new([signer.certificate]);
        Encoder::new(config, Arc::new(CertificateResolver::new(Arc::new(store))))
    }

    #[test]
    fn test_disabled_encoder_passes_payload_through() {
        let encoder = encoder(EncodeConfig {
            disable: true,
            ..EncodeConfig::default()
        });
        let out = encoder
            .execute(b"raw bytes", &mut MemoryMetadata::new())
            .unwrap();
        assert_eq!(out.into_inner(), b"raw bytes");
    }

    #[test]
    fn test_unresolvable_certificate_is_an_error() {
        let encoder = encoder(EncodeConfig::default());
        let err = encoder
            .execute(b"payload", &mut MemoryMetadata::new())
            .unwrap_err();
        assert!(matches!(err, SealError::CertificateUnresolved(_)));
    }

    #[test]
    fn test_target_id_defaults_to_certificate_subject_serial() {
        let encoder = encoder(EncodeConfig {
            customer_id: 1,
            ..EncodeConfig::default()
        });
        let mut host = MemoryMetadata::new();
        host.set_known(keys::SOURCE_PARTY_ID, TestIdentity::SIGNER_PARTY_SERIAL);
        let out = encoder.execute(b"payload", &mut host).unwrap();

        let root = xml::parse_bytes(out.get_ref()).unwrap();
        assert_eq!(
            root.child_element("TargetId").unwrap().text_content(),
            TestIdentity::SIGNER_PARTY_SERIAL
        );
        assert!(host.get_known(keys::EXECUTION_SERIAL).is_some());
    }

    #[test]
    fn test_user_filename_is_stripped_to_base_name() {
        let encoder = encoder(EncodeConfig {
            certificate_thumbprint: Some(TestIdentity::SIGNER_THUMBPRINT.to_string()),
            ..EncodeConfig::default()
        });
        let mut host = MemoryMetadata::new();
        host.set_known(keys::RECEIVED_FILE_NAME, "/var/spool/out/payments.xml");
        let out = encoder.execute(b"payload", &mut host).unwrap();

        let root = xml::parse_bytes(out.get_ref()).unwrap();
        assert_eq!(
            root.child_element("UserFilename").unwrap().text_content(),
            "payments.xml"
        );
    }

    #[test]
    fn test_serial_lookup_rejects_wrong_cn() {
        let encoder = encoder(EncodeConfig {
            certificate_cn: Some("Somebody Else".to_string()),
            ..EncodeConfig::default()
        });
        let mut host = MemoryMetadata::new();
        host.set_known(keys::SOURCE_PARTY_ID, TestIdentity::SIGNER_PARTY_SERIAL);
        assert!(encoder.execute(b"payload", &mut host).is_err());
    }
}
