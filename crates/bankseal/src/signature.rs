//! Enveloped XML signature engine.
//!
//! Signing appends a `Signature` element to the document root. Its digest
//! covers the exclusive canonical form of the document *without* the
//! signature element; its `SignedInfo` is canonicalized standalone and
//! signed RSA/SHA-256. Verification reverses both steps and, depending on
//! the trust policy, takes the certificate from the document itself or
//! from the injected trust-store resolver.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use sha2::{Digest, Sha256};

use bankseal_certs::{CertError, Certificate, CertificateResolver};
use bankseal_core::xml::{canonical_bytes, Element, Node};
use bankseal_core::{TrustPolicy, XMLDSIG_NS};

use crate::error::{Result, SealError};

pub const ALG_C14N_EXCLUSIVE: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const ALG_RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const ALG_SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const ALG_ENVELOPED: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// How the verifier obtains its certificate.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub trust: TrustPolicy,
    pub thumbprint: Option<String>,
    pub previous_thumbprint: Option<String>,
}

/// Sign the document in place: compute the digest over its current
/// canonical form, then append the `Signature` element.
///
/// The certificate must carry a private key.
pub fn sign(document: &mut Element, certificate: &Certificate) -> Result<()> {
    let private_key = certificate.private_key().ok_or_else(|| {
        SealError::CertificateUnavailable(format!(
            "certificate {} has no private key",
            certificate.thumbprint()
        ))
    })?;

    let digest = Sha256::digest(canonical_bytes(document));
    let signed_info = build_signed_info(&STANDARD.encode(digest));

    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature_bytes = signing_key
        .try_sign(&canonical_bytes(&signed_info))
        .map_err(|e| SealError::SigningFailed(e.to_string()))?
        .to_bytes();

    let signature = build_signature(signed_info, &STANDARD.encode(signature_bytes), certificate);
    document.children.push(Node::Element(signature));
    Ok(())
}

/// Verify the enveloped signature and return the certificate that checked
/// out.
///
/// The resolver is consulted only under [`TrustPolicy::Store`].
pub fn verify(
    document: &Element,
    options: &VerifyOptions,
    resolver: Option<&CertificateResolver>,
) -> Result<Certificate> {
    // Compliant envelopes put the signature in the dsig namespace, but
    // some counterparties emit it with bare tag names.
    let signature = document
        .find_descendant(Some(XMLDSIG_NS), "Signature")
        .or_else(|| document.find_descendant_local("Signature"))
        .ok_or(SealError::SignatureElementMissing)?;
    let signature_namespace = signature.namespace.clone();

    let certificate = match options.trust {
        TrustPolicy::Embedded => embedded_certificate(signature)?,
        TrustPolicy::Store => stored_certificate(options, resolver)?,
    };

    let signed_info = signature
        .child_element("SignedInfo")
        .ok_or_else(|| SealError::SignatureInvalid("no SignedInfo element".to_string()))?;
    let signature_value = signature
        .child_element("SignatureValue")
        .ok_or_else(|| SealError::SignatureInvalid("no SignatureValue element".to_string()))?;
    let signature_bytes = decode_base64_text(&signature_value.text_content())?;
    let signature = Signature::try_from(signature_bytes.as_slice())
        .map_err(|e| SealError::SignatureInvalid(e.to_string()))?;

    let verifying_key = VerifyingKey::<Sha256>::new(certificate.public_key().clone());
    verifying_key
        .verify(&canonical_bytes(signed_info), &signature)
        .map_err(|e| SealError::SignatureInvalid(format!("SignedInfo signature: {e}")))?;

    // The signature checks out; now tie it to this document by recomputing
    // the digest over the canonical form minus the signature element.
    let expected_digest = signed_info
        .find_descendant_local("DigestValue")
        .ok_or_else(|| SealError::SignatureInvalid("no DigestValue element".to_string()))?;
    let expected = decode_base64_text(&expected_digest.text_content())?;

    let mut unsigned = document.clone();
    unsigned.remove_descendant(signature_namespace.as_deref(), "Signature");
    let actual = Sha256::digest(canonical_bytes(&unsigned));

    if actual.as_slice() != expected.as_slice() {
        return Err(SealError::SignatureInvalid(
            "document digest mismatch".to_string(),
        ));
    }
    Ok(certificate)
}

fn embedded_certificate(signature: &Element) -> Result<Certificate> {
    let element = signature
        .find_descendant(Some(XMLDSIG_NS), "X509Certificate")
        .or_else(|| signature.find_descendant_local("X509Certificate"))
        .ok_or_else(|| {
            SealError::CertificateUnavailable("no embedded X509Certificate".to_string())
        })?;
    let der = decode_base64_text(&element.text_content())?;
    Ok(Certificate::from_der(&der)?)
}

fn stored_certificate(
    options: &VerifyOptions,
    resolver: Option<&CertificateResolver>,
) -> Result<Certificate> {
    let resolver = resolver.ok_or_else(|| {
        SealError::CertificateUnresolved("store trust policy requires a resolver".to_string())
    })?;
    let thumbprint = options.thumbprint.as_deref().ok_or_else(|| {
        SealError::CertificateUnresolved("store trust policy requires a thumbprint".to_string())
    })?;

    match resolver.resolve_by_thumbprint(thumbprint) {
        Ok(certificate) => Ok((*certificate).clone()),
        Err(CertError::NotFound { query }) => {
            let previous = options.previous_thumbprint.as_deref().ok_or(
                SealError::Certificate(CertError::NotFound { query }),
            )?;
            tracing::warn!(
                thumbprint,
                previous,
                "configured certificate not found, trying previous thumbprint"
            );
            Ok((*resolver.resolve_by_thumbprint(previous)?).clone())
        }
        Err(other) => Err(other.into()),
    }
}

fn build_signed_info(digest_b64: &str) -> Element {
    dsig("SignedInfo")
        .child(dsig("CanonicalizationMethod").attr("Algorithm", ALG_C14N_EXCLUSIVE))
        .child(dsig("SignatureMethod").attr("Algorithm", ALG_RSA_SHA256))
        .child(
            dsig("Reference")
                .attr("URI", "")
                .child(
                    dsig("Transforms")
                        .child(dsig("Transform").attr("Algorithm", ALG_ENVELOPED))
                        .child(dsig("Transform").attr("Algorithm", ALG_C14N_EXCLUSIVE)),
                )
                .child(dsig("DigestMethod").attr("Algorithm", ALG_SHA256))
                .child(dsig("DigestValue").text(digest_b64)),
        )
}

fn build_signature(
    signed_info: Element,
    signature_b64: &str,
    certificate: &Certificate,
) -> Element {
    dsig("Signature")
        .child(signed_info)
        .child(dsig("SignatureValue").text(signature_b64))
        .child(
            dsig("KeyInfo").child(
                dsig("X509Data")
                    .child(
                        dsig("X509IssuerSerial")
                            .child(dsig("X509IssuerName").text(certificate.issuer()))
                            .child(dsig("X509SerialNumber").text(certificate.serial_hex())),
                    )
                    .child(dsig("X509Certificate").text(&STANDARD.encode(certificate.der()))),
            ),
        )
}

fn dsig(name: &str) -> Element {
    Element::new(name, Some(XMLDSIG_NS))
}

/// Base64 text from an XML element may be line-wrapped; strip whitespace
/// before decoding.
fn decode_base64_text(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| SealError::SignatureInvalid(format!("invalid base64: {e}")))
}
