//! Outbound request signing
//!
//! Every proxied exchange API call carries HMAC credentials derived from the
//! current Unix time, the upper-cased method, the path and the canonical JSON
//! body. Signatures are recomputed for every attempt and never cached: the
//! timestamp is part of the signed payload, so a reused signature goes stale.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use relay_types::clock::unix_seconds;
use relay_types::credentials::Credentials;
use relay_types::errors::ConfigurationError;
use serde_json::Value;
use tracing::debug;

use crate::digest::hmac_sha256;

// ---------------------------------------------------------------------------
// Header names
// ---------------------------------------------------------------------------

pub const HEADER_API_KEY: &str = "POLY-API-KEY";
pub const HEADER_TIMESTAMP: &str = "POLY-TIMESTAMP";
pub const HEADER_SIGNATURE: &str = "POLY-SIGNATURE";
pub const HEADER_PASSPHRASE: &str = "POLY-PASSPHRASE";
pub const HEADER_BUILDER_ID: &str = "X-Builder-ID";

// ---------------------------------------------------------------------------
// Signing context
// ---------------------------------------------------------------------------

/// Canonical body string: compact JSON for a body with at least one key or
/// element, empty otherwise.
///
/// Empty objects, empty arrays, empty strings, numbers, booleans and `null`
/// all sign as an empty body. `serde_json::Map` keeps keys sorted, so equal
/// values always serialize to the same bytes.
pub fn canonical_body(body: Option<&Value>) -> String {
    match body {
        Some(value @ Value::Object(map)) if !map.is_empty() => value.to_string(),
        Some(value @ Value::Array(items)) if !items.is_empty() => value.to_string(),
        Some(value @ Value::String(text)) if !text.is_empty() => value.to_string(),
        _ => String::new(),
    }
}

/// Per-request inputs to the outbound signature. Ephemeral; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext {
    timestamp: String,
    method: String,
    path: String,
    body: String,
}

impl SigningContext {
    pub fn new(timestamp_secs: i64, method: &str, path: &str, body: Option<&Value>) -> Self {
        Self {
            timestamp: timestamp_secs.to_string(),
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            body: canonical_body(body),
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// `timestamp ++ METHOD ++ path ++ body`
    pub fn payload(&self) -> String {
        format!("{}{}{}{}", self.timestamp, self.method, self.path, self.body)
    }
}

// ---------------------------------------------------------------------------
// Signed headers
// ---------------------------------------------------------------------------

/// Authentication headers for one outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub api_key: String,
    pub timestamp: String,
    pub signature: String,
    pub passphrase: String,
    pub builder_id: Option<String>,
}

impl SignedHeaders {
    /// Header name/value pairs; the builder header only when configured.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            (HEADER_API_KEY, self.api_key.as_str()),
            (HEADER_TIMESTAMP, self.timestamp.as_str()),
            (HEADER_SIGNATURE, self.signature.as_str()),
            (HEADER_PASSPHRASE, self.passphrase.as_str()),
        ];
        if let Some(builder_id) = &self.builder_id {
            pairs.push((HEADER_BUILDER_ID, builder_id.as_str()));
        }
        pairs
    }
}

/// Sign a prepared context with `credentials`.
///
/// Refuses to produce a partial signature when a required credential is
/// missing.
pub fn sign_request(
    credentials: &Credentials,
    context: &SigningContext,
) -> Result<SignedHeaders, SigningError> {
    credentials.ensure_present()?;

    let tag = hmac_sha256(
        credentials.api_secret.as_bytes(),
        &[context.payload().as_bytes()],
    )
    .map_err(|e| SigningError::Authentication(e.to_string()))?;

    Ok(SignedHeaders {
        api_key: credentials.api_key.clone(),
        timestamp: context.timestamp().to_string(),
        signature: BASE64.encode(tag),
        passphrase: credentials.passphrase.clone(),
        builder_id: credentials.builder_id.clone(),
    })
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// Signs outbound exchange requests with the process credentials.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Arc<Credentials>,
}

impl RequestSigner {
    pub fn new(credentials: Arc<Credentials>) -> Self {
        Self { credentials }
    }

    /// Sign using the current wall-clock time.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<SignedHeaders, SigningError> {
        self.sign_at(unix_seconds(), method, path, body)
    }

    /// Sign with an explicit timestamp (Unix seconds).
    pub fn sign_at(
        &self,
        timestamp_secs: i64,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<SignedHeaders, SigningError> {
        let context = SigningContext::new(timestamp_secs, method, path, body);
        let headers = sign_request(&self.credentials, &context)?;
        debug!(
            method = context.method(),
            path = context.path(),
            timestamp = context.timestamp(),
            "Signed outbound request"
        );
        Ok(headers)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Outbound signing errors. Both variants are server-side faults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error("Server configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Failed to sign request: {0}")]
    Authentication(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TS: i64 = 1_708_123_456;

    fn credentials(builder_id: Option<&str>) -> Arc<Credentials> {
        Arc::new(Credentials {
            api_key: "api-key-123".to_string(),
            api_secret: "c2VjcmV0LXNlY3JldC1zZWNyZXQtc2VjcmV0LXNlY3JldA==".to_string(),
            passphrase: "passphrase".to_string(),
            signer_private_key: "ab".repeat(32),
            builder_id: builder_id.map(str::to_string),
        })
    }

    #[test]
    fn test_canonical_body() {
        assert_eq!(canonical_body(None), "");
        assert_eq!(canonical_body(Some(&Value::Null)), "");
        assert_eq!(canonical_body(Some(&json!({}))), "");
        assert_eq!(canonical_body(Some(&json!([]))), "");
        assert_eq!(canonical_body(Some(&json!(""))), "");
        assert_eq!(canonical_body(Some(&json!(42))), "");
        assert_eq!(canonical_body(Some(&json!(true))), "");
        assert_eq!(canonical_body(Some(&json!([{"id": "1"}]))), r#"[{"id":"1"}]"#);
        assert_eq!(
            canonical_body(Some(&json!({"size": "10", "price": "0.52"}))),
            r#"{"price":"0.52","size":"10"}"#
        );
    }

    #[test]
    fn test_payload_layout() {
        let ctx = SigningContext::new(TS, "post", "/order", Some(&json!({"a": 1})));
        assert_eq!(ctx.payload(), r#"1708123456POST/order{"a":1}"#);

        let ctx = SigningContext::new(TS, "get", "/markets", None);
        assert_eq!(ctx.payload(), "1708123456GET/markets");
    }

    #[test]
    fn test_signature_matches_independent_hmac() {
        let creds = credentials(None);
        let signer = RequestSigner::new(creds.clone());
        let headers = signer.sign_at(TS, "GET", "/markets", None).unwrap();

        let tag = hmac_sha256(creds.api_secret.as_bytes(), &[b"1708123456GET/markets"]).unwrap();
        assert_eq!(headers.signature, BASE64.encode(tag));
        assert_eq!(BASE64.decode(&headers.signature).unwrap().len(), 32);
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = RequestSigner::new(credentials(None));
        let body = json!({"market": "0xabc", "side": "BUY"});
        let a = signer.sign_at(TS, "POST", "/order", Some(&body)).unwrap();
        let b = signer.sign_at(TS, "post", "/order", Some(&body)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_each_input_changes_signature() {
        let signer = RequestSigner::new(credentials(None));
        let body = json!({"size": "10"});
        let base = signer.sign_at(TS, "POST", "/order", Some(&body)).unwrap();

        let variants = [
            signer.sign_at(TS + 1, "POST", "/order", Some(&body)).unwrap(),
            signer.sign_at(TS, "DELETE", "/order", Some(&body)).unwrap(),
            signer.sign_at(TS, "POST", "/orders", Some(&body)).unwrap(),
            signer
                .sign_at(TS, "POST", "/order", Some(&json!({"size": "11"})))
                .unwrap(),
        ];
        for variant in variants {
            assert_ne!(variant.signature, base.signature);
        }
    }

    #[test]
    fn test_headers_without_builder() {
        let signer = RequestSigner::new(credentials(None));
        let headers = signer.sign_at(TS, "GET", "/markets", None).unwrap();
        let names: Vec<_> = headers.pairs().into_iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![HEADER_API_KEY, HEADER_TIMESTAMP, HEADER_SIGNATURE, HEADER_PASSPHRASE]
        );
        assert_eq!(headers.timestamp, "1708123456");
        assert_eq!(headers.api_key, "api-key-123");
    }

    #[test]
    fn test_headers_with_builder() {
        let signer = RequestSigner::new(credentials(Some("builder-7")));
        let headers = signer.sign_at(TS, "GET", "/markets", None).unwrap();
        assert!(headers.pairs().contains(&(HEADER_BUILDER_ID, "builder-7")));
    }

    #[test]
    fn test_missing_credentials_is_configuration_error() {
        let mut creds = (*credentials(None)).clone();
        creds.passphrase.clear();
        let signer = RequestSigner::new(Arc::new(creds));

        let err = signer.sign_at(TS, "GET", "/markets", None).unwrap_err();
        assert_eq!(
            err,
            SigningError::Configuration(ConfigurationError::CredentialsIncomplete(vec![
                "passphrase"
            ]))
        );
    }

    #[test]
    fn test_sign_uses_current_time() {
        let signer = RequestSigner::new(credentials(None));
        let before = unix_seconds();
        let headers = signer.sign("GET", "/markets", None).unwrap();
        let ts: i64 = headers.timestamp.parse().unwrap();
        assert!(ts >= before && ts <= unix_seconds());
    }
}
