//! The certificate type: a parsed X.509 identity with its RSA key material.

use std::collections::BTreeMap;
use std::fmt;

use rsa::pkcs8::DecodePublicKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use x509_cert::der::asn1::{Ia5StringRef, PrintableStringRef, Utf8StringRef};
use x509_cert::der::{Any, Decode, DecodePem, Encode};
use x509_cert::name::Name;
use x509_cert::Certificate as X509Certificate;

use crate::error::CertError;

const OID_COMMON_NAME: &str = "2.5.4.3";
const OID_SERIAL_NUMBER: &str = "2.5.4.5";
const OID_ORGANIZATION: &str = "2.5.4.10";
const OID_COUNTRY: &str = "2.5.4.6";

/// Normalize a thumbprint for comparison: separators stripped, lower-cased.
pub fn normalize_thumbprint(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// An X.509 identity with its key material.
///
/// Immutable once constructed; resolver caches hand out `Arc`s of these.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    thumbprint: String,
    subject: BTreeMap<String, String>,
    issuer: String,
    serial_hex: String,
    public_key: RsaPublicKey,
    private_key: Option<RsaPrivateKey>,
}

impl Certificate {
    /// Parse a certificate from DER bytes. No private key is attached.
    pub fn from_der(der: &[u8]) -> Result<Self, CertError> {
        let parsed =
            X509Certificate::from_der(der).map_err(|e| CertError::Parse(e.to_string()))?;
        let spki_der = parsed
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| CertError::Parse(e.to_string()))?;
        let public_key = RsaPublicKey::from_public_key_der(&spki_der)
            .map_err(|e| CertError::Parse(format!("not an RSA public key: {e}")))?;

        Ok(Self {
            thumbprint: hex::encode(Sha1::digest(der)),
            subject: subject_attributes(&parsed.tbs_certificate.subject),
            issuer: parsed.tbs_certificate.issuer.to_string(),
            serial_hex: hex::encode_upper(parsed.tbs_certificate.serial_number.as_bytes()),
            public_key,
            private_key: None,
            der: der.to_vec(),
        })
    }

    /// Parse a certificate from PEM text.
    pub fn from_pem(pem: &str) -> Result<Self, CertError> {
        let parsed = X509Certificate::from_pem(pem.as_bytes())
            .map_err(|e| CertError::Parse(e.to_string()))?;
        let der = parsed
            .to_der()
            .map_err(|e| CertError::Parse(e.to_string()))?;
        Self::from_der(&der)
    }

    /// Attach the private key, making this certificate usable for signing.
    pub fn with_private_key(mut self, key: RsaPrivateKey) -> Self {
        self.private_key = Some(key);
        self
    }

    /// Raw DER encoding.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Normalized SHA-1 thumbprint (lowercase hex, no separators).
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// Issuer distinguished name, RFC 4514 form.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Certificate serial number as uppercase hex.
    pub fn serial_hex(&self) -> &str {
        &self.serial_hex
    }

    /// A subject attribute by short name (`CN`, `SERIALNUMBER`, ...).
    pub fn subject_attribute(&self, name: &str) -> Option<&str> {
        self.subject.get(name).map(String::as_str)
    }

    /// The subject `SERIALNUMBER` attribute, the party identifier used by
    /// serial-number lookups and the default `TargetId`.
    pub fn subject_serial_number(&self) -> Option<&str> {
        self.subject_attribute("SERIALNUMBER")
    }

    /// The subject `CN` attribute.
    pub fn common_name(&self) -> Option<&str> {
        self.subject_attribute("CN")
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> Option<&RsaPrivateKey> {
        self.private_key.as_ref()
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("thumbprint", &&self.thumbprint[..16.min(self.thumbprint.len())])
            .field("subject", &self.subject)
            .field("has_private_key", &self.private_key.is_some())
            .finish()
    }
}

fn subject_attributes(name: &Name) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    for rdn in name.0.iter() {
        for atv in rdn.0.iter() {
            let key = match atv.oid.to_string().as_str() {
                OID_COMMON_NAME => "CN",
                OID_SERIAL_NUMBER => "SERIALNUMBER",
                OID_ORGANIZATION => "O",
                OID_COUNTRY => "C",
                _ => continue,
            };
            if let Some(value) = directory_string(&atv.value) {
                attributes.insert(key.to_string(), value);
            }
        }
    }
    attributes
}

fn directory_string(value: &Any) -> Option<String> {
    if let Ok(s) = value.decode_as::<Utf8StringRef<'_>>() {
        return Some(s.to_string());
    }
    if let Ok(s) = value.decode_as::<PrintableStringRef<'_>>() {
        return Some(s.to_string());
    }
    if let Ok(s) = value.decode_as::<Ia5StringRef<'_>>() {
        return Some(s.to_string());
    }
    None
}
