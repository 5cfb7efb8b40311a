//! Property tests for the signing schemes
//!
//! - Outbound: identical inputs sign identically, any changed input changes the signature
//! - Inbound: flipping any single byte of body, timestamp or signature is rejected

use std::sync::Arc;

use proptest::prelude::*;
use relay_signing::{RequestSigner, VerificationFailure, WebhookEnvelope, WebhookVerifier};
use relay_types::credentials::Credentials;
use serde_json::json;

const NOW: i64 = 1_708_123_456;

fn signer() -> RequestSigner {
    RequestSigner::new(Arc::new(Credentials {
        api_key: "prop-key".to_string(),
        api_secret: "cHJvcC1zZWNyZXQtcHJvcC1zZWNyZXQtcHJvcA==".to_string(),
        passphrase: "prop-pass".to_string(),
        signer_private_key: "0x".to_string() + &"11".repeat(32),
        builder_id: None,
    }))
}

fn verifier() -> WebhookVerifier {
    WebhookVerifier::new("prop-webhook-secret-prop-webhook")
}

fn method() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("GET".to_string()),
        Just("POST".to_string()),
        Just("DELETE".to_string()),
        Just("PUT".to_string()),
    ]
}

proptest! {
    #[test]
    fn prop_outbound_signature_deterministic(
        ts in 1_600_000_000i64..1_900_000_000,
        method in method(),
        path in "/[a-z]{1,12}",
        size in 1u32..10_000,
    ) {
        let body = json!({ "size": size.to_string() });
        let s = signer();
        let a = s.sign_at(ts, &method, &path, Some(&body)).unwrap();
        let b = s.sign_at(ts, &method.to_lowercase(), &path, Some(&body)).unwrap();
        prop_assert_eq!(a.signature, b.signature);
    }

    #[test]
    fn prop_outbound_distinct_inputs_distinct_signatures(
        ts in 1_600_000_000i64..1_900_000_000,
        path_a in "/[a-z]{1,12}",
        path_b in "/[a-z]{1,12}",
    ) {
        prop_assume!(path_a != path_b);
        let s = signer();
        let a = s.sign_at(ts, "GET", &path_a, None).unwrap();
        let b = s.sign_at(ts, "GET", &path_b, None).unwrap();
        prop_assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn prop_webhook_body_flip_rejected(
        body in proptest::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let v = verifier();
        let ts = NOW.to_string();
        let sig = v.expected_signature(&ts, &body).unwrap();

        let ok = WebhookEnvelope { signature: Some(&sig), timestamp: Some(&ts), body: &body };
        prop_assert_eq!(v.verify_at(&ok, NOW), Ok(()));

        let mut tampered = body.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= flip;
        let bad = WebhookEnvelope { signature: Some(&sig), timestamp: Some(&ts), body: &tampered };
        prop_assert_eq!(v.verify_at(&bad, NOW), Err(VerificationFailure::InvalidSignature));
    }

    #[test]
    fn prop_webhook_signature_flip_rejected(
        index in 0usize..64,
        flip in 1u8..=127,
    ) {
        let v = verifier();
        let ts = NOW.to_string();
        let body = br#"{"event":"trade"}"#;
        let sig = v.expected_signature(&ts, body).unwrap();

        let mut bytes = sig.into_bytes();
        bytes[index] ^= flip;
        // Hex digits and the flip mask are both below 0x80, so the result stays ASCII.
        let tampered = String::from_utf8(bytes).unwrap();
        let bad = WebhookEnvelope { signature: Some(&tampered), timestamp: Some(&ts), body };
        prop_assert_eq!(v.verify_at(&bad, NOW), Err(VerificationFailure::InvalidSignature));
    }

    #[test]
    fn prop_webhook_timestamp_digit_change_rejected(
        delta in 1i64..=299,
    ) {
        let v = verifier();
        let ts = NOW.to_string();
        let body = br#"{"event":"trade"}"#;
        let sig = v.expected_signature(&ts, body).unwrap();

        let moved = (NOW - delta).to_string();
        let bad = WebhookEnvelope { signature: Some(&sig), timestamp: Some(&moved), body };
        prop_assert_eq!(v.verify_at(&bad, NOW), Err(VerificationFailure::InvalidSignature));
    }
}
