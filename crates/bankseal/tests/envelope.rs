//! End-to-end envelope scenarios: encode → decode round trips,
//! verification policies, fault handling.

use std::io::Cursor;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use bankseal::certs::{CertificateResolver, MemoryTrustStore};
use bankseal::core::{
    keys, serial, DecodeConfig, EncodeConfig, MemoryMetadata, TrustPolicy,
};
use bankseal::{DecodeOutcome, Decoder, Encoder, SealError};
use bankseal_testkit::fixtures::{ResponseEnvelope, TestIdentity};
use bankseal_testkit::generators;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn signer_resolver() -> Arc<CertificateResolver> {
    let store = MemoryTrustStore::new([TestIdentity::signer().certificate]);
    Arc::new(CertificateResolver::new(Arc::new(store)))
}

fn encoder(compress: bool) -> Encoder {
    Encoder::new(
        EncodeConfig {
            customer_id: 7723525704,
            environment: "PRODUCTION".to_string(),
            target_id: Some("123456789012".to_string()),
            compress,
            software_id: "bankseal test".to_string(),
            file_type: "NDCAPXMLI".to_string(),
            certificate_thumbprint: Some(TestIdentity::SIGNER_THUMBPRINT.to_string()),
            ..EncodeConfig::default()
        },
        signer_resolver(),
    )
}

#[test]
fn test_end_to_end_round_trip_with_verification() {
    init_tracing();
    let mut host = MemoryMetadata::new();
    let envelope = encoder(true).execute(b"hello", &mut host).unwrap();

    let decoder = Decoder::new(DecodeConfig {
        verify: true,
        ..DecodeConfig::default()
    });
    let mut input = Cursor::new(envelope.into_inner());
    let outcome = decoder.execute(&mut input, &mut host).unwrap();

    match outcome {
        DecodeOutcome::Decoded { payload, metadata } => {
            assert_eq!(payload.into_inner(), b"hello");
            assert_eq!(metadata.response_code, 0);
            let message_type = metadata.message_type.unwrap();
            assert_eq!(message_type.name, "ApplicationRequest");
        }
        other => panic!("expected decoded outcome, got {other:?}"),
    }
    assert_eq!(host.get_known(keys::RESPONSE_CODE).as_deref(), Some("0"));
}

#[test]
fn test_store_trust_verifies_against_provisioned_certificate() {
    init_tracing();
    let mut host = MemoryMetadata::new();
    let envelope = encoder(false).execute(b"hello", &mut host).unwrap();

    let decoder = Decoder::with_resolver(
        DecodeConfig {
            verify: true,
            trust: TrustPolicy::Store,
            thumbprint: Some(TestIdentity::SIGNER_THUMBPRINT.to_string()),
            ..DecodeConfig::default()
        },
        signer_resolver(),
    );
    let mut input = Cursor::new(envelope.into_inner());
    assert!(matches!(
        decoder.execute(&mut input, &mut host).unwrap(),
        DecodeOutcome::Decoded { .. }
    ));
}

#[test]
fn test_store_trust_falls_back_to_previous_thumbprint() {
    init_tracing();
    let mut host = MemoryMetadata::new();
    let envelope = encoder(false).execute(b"hello", &mut host).unwrap();

    // Rotation cutover: the configured thumbprint is not in the store yet.
    let decoder = Decoder::with_resolver(
        DecodeConfig {
            verify: true,
            trust: TrustPolicy::Store,
            thumbprint: Some("ffffffffffffffffffffffffffffffffffffffff".to_string()),
            previous_thumbprint: Some(TestIdentity::SIGNER_THUMBPRINT.to_string()),
            ..DecodeConfig::default()
        },
        signer_resolver(),
    );
    let mut input = Cursor::new(envelope.into_inner());
    assert!(matches!(
        decoder.execute(&mut input, &mut host).unwrap(),
        DecodeOutcome::Decoded { .. }
    ));
}

#[test]
fn test_tampered_envelope_fails_verification() {
    init_tracing();
    let mut host = MemoryMetadata::new();
    let envelope = encoder(false).execute(b"hello", &mut host).unwrap();
    let text = String::from_utf8(envelope.into_inner()).unwrap();
    let tampered = text.replace("PRODUCTION", "PRODUCTIOM");
    assert_ne!(text, tampered);

    let decoder = Decoder::new(DecodeConfig {
        verify: true,
        ..DecodeConfig::default()
    });
    let mut input = Cursor::new(tampered.into_bytes());
    assert!(matches!(
        decoder.execute(&mut input, &mut host),
        Err(SealError::SignatureInvalid(_))
    ));
}

#[test]
fn test_wrong_certificate_fails_verification() {
    init_tracing();
    let mut host = MemoryMetadata::new();
    let envelope = encoder(false).execute(b"hello", &mut host).unwrap();

    // The store holds the other party's certificate under verification.
    let other = TestIdentity::other().certificate;
    let wrong_thumbprint = other.thumbprint().to_string();
    let store = MemoryTrustStore::new([other]);
    let decoder = Decoder::with_resolver(
        DecodeConfig {
            verify: true,
            trust: TrustPolicy::Store,
            thumbprint: Some(wrong_thumbprint),
            ..DecodeConfig::default()
        },
        Arc::new(CertificateResolver::new(Arc::new(store))),
    );
    let mut input = Cursor::new(envelope.into_inner());
    assert!(matches!(
        decoder.execute(&mut input, &mut host),
        Err(SealError::SignatureInvalid(_))
    ));
}

#[test]
fn test_verification_failure_with_pass_thru_publishes_fault() {
    init_tracing();
    let mut host = MemoryMetadata::new();
    host.set_known(keys::INTERCHANGE_ID, "msg-42");
    // Unsigned document, so verification cannot succeed.
    let unsigned = ResponseEnvelope::with_content(b"data", false).to_xml();

    let decoder = Decoder::new(DecodeConfig {
        verify: true,
        pass_thru: true,
        ..DecodeConfig::default()
    });
    let mut input = Cursor::new(unsigned);
    let outcome = decoder.execute(&mut input, &mut host).unwrap();

    match outcome {
        DecodeOutcome::PassThrough { metadata } => {
            assert_eq!(metadata.response_code, -1);
            assert!(!metadata.response_text.is_empty());
        }
        other => panic!("expected pass-through, got {other:?}"),
    }
    assert_eq!(input.position(), 0);
    assert_eq!(host.get_known(keys::RESPONSE_CODE).as_deref(), Some("-1"));
}

#[test]
fn test_fault_response_passes_through_without_content_parse() {
    init_tracing();
    let mut host = MemoryMetadata::new();
    // No Content element at all; pass-through must not miss it.
    let fault = ResponseEnvelope::fault(5, "Invalid file").to_xml();

    let decoder = Decoder::new(DecodeConfig {
        pass_thru: true,
        ..DecodeConfig::default()
    });
    let mut input = Cursor::new(fault);
    let outcome = decoder.execute(&mut input, &mut host).unwrap();

    match outcome {
        DecodeOutcome::PassThrough { metadata } => {
            assert_eq!(metadata.response_code, 5);
            assert_eq!(metadata.response_text, "Invalid file");
        }
        other => panic!("expected pass-through, got {other:?}"),
    }
    assert_eq!(input.position(), 0);
    assert_eq!(host.get_known(keys::RESPONSE_TEXT).as_deref(), Some("Invalid file"));
}

#[test]
fn test_missing_content_without_pass_thru_is_malformed() {
    init_tracing();
    let fault = ResponseEnvelope::fault(5, "Invalid file").to_xml();
    let decoder = Decoder::new(DecodeConfig::default());
    let mut input = Cursor::new(fault);
    assert!(matches!(
        decoder.execute(&mut input, &mut MemoryMetadata::new()),
        Err(SealError::Envelope(_))
    ));
    assert_eq!(input.position(), 0);
}

#[test]
fn test_compressed_content_supersedes_envelope_message_type() {
    init_tracing();
    let mut host = MemoryMetadata::new();
    let response =
        ResponseEnvelope::with_content(br#"<Payment xmlns="urn:pay"><Sum>1</Sum></Payment>"#, true)
            .to_xml();

    let decoder = Decoder::new(DecodeConfig::default());
    let mut input = Cursor::new(response);
    match decoder.execute(&mut input, &mut host).unwrap() {
        DecodeOutcome::Decoded { metadata, .. } => {
            assert_eq!(metadata.message_type.unwrap().to_string(), "urn:pay#Payment");
        }
        other => panic!("expected decoded outcome, got {other:?}"),
    }
    assert_eq!(
        host.get_known(keys::MESSAGE_TYPE).as_deref(),
        Some("urn:pay#Payment")
    );
}

#[test]
fn test_legacy_serial_publishes_signer_and_destination() {
    init_tracing();
    let mut host = MemoryMetadata::new();
    let response = ResponseEnvelope {
        execution_serial: Some("20240307142213165123000000000042".to_string()),
        content: Some(b"report".to_vec()),
        ..ResponseEnvelope::default()
    }
    .to_xml();

    let decoder = Decoder::new(DecodeConfig::default());
    let mut input = Cursor::new(response);
    decoder.execute(&mut input, &mut host).unwrap();

    assert_eq!(host.get_known(keys::SIGNER_ID).as_deref(), Some("42"));
    assert_eq!(host.get_known(keys::DESTINATION_PARTY).as_deref(), Some("42"));
}

#[test]
fn test_disabled_decoder_rewinds_and_passes_through() {
    init_tracing();
    let decoder = Decoder::new(DecodeConfig {
        disable: true,
        ..DecodeConfig::default()
    });
    let mut input = Cursor::new(b"not even xml".to_vec());
    input.set_position(5);
    let outcome = decoder
        .execute(&mut input, &mut MemoryMetadata::new())
        .unwrap();
    assert!(matches!(outcome, DecodeOutcome::PassThrough { .. }));
    assert_eq!(input.position(), 0);
}

#[test]
fn test_thumbprint_resolution_is_normalized_and_shared() {
    init_tracing();
    let resolver = signer_resolver();
    let spaced = "0A:DD:90:9B:4F:62:C7:96:05:BD:67:28:C8:2C:32:50:F6:97:67:36";
    let first = resolver.resolve_by_thumbprint(spaced).unwrap();
    let second = resolver
        .resolve_by_thumbprint(TestIdentity::SIGNER_THUMBPRINT)
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_concurrent_resolution_yields_one_cached_certificate() {
    init_tracing();
    let resolver = signer_resolver();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            thread::spawn(move || {
                resolver
                    .resolve_by_thumbprint(TestIdentity::SIGNER_THUMBPRINT)
                    .unwrap()
            })
        })
        .collect();
    let resolved: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for certificate in &resolved[1..] {
        assert!(Arc::ptr_eq(&resolved[0], certificate));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_pipeline_round_trips_any_payload(
        payload in generators::payload(),
        compress in any::<bool>(),
    ) {
        let mut host = MemoryMetadata::new();
        let envelope = encoder(compress).execute(&payload, &mut host).unwrap();
        let decoder = Decoder::new(DecodeConfig {
            verify: true,
            ..DecodeConfig::default()
        });
        let mut input = Cursor::new(envelope.into_inner());
        match decoder.execute(&mut input, &mut host).unwrap() {
            DecodeOutcome::Decoded { payload: decoded, .. } => {
                prop_assert_eq!(decoded.into_inner(), payload);
            }
            other => prop_assert!(false, "expected decoded outcome, got {:?}", other),
        }
    }

    #[test]
    fn prop_execution_serial_shape(target in generators::padded_target_id()) {
        let generated = serial::generate(&target, None).unwrap();
        prop_assert!(generated.len() >= 30 && generated.len() <= 32);
        prop_assert!(generated.ends_with(&target));
        prop_assert!(generated[..17].bytes().all(|b| b.is_ascii_digit()));
    }
}
