//! Inbound webhook verification
//!
//! Callbacks are authenticated with a hex HMAC-SHA256 over
//! `timestamp + raw body`. Checks run in order and stop at the first failure:
//! presence, replay window, then a constant-time signature comparison.

use std::fmt;

use relay_types::clock::unix_seconds;
use relay_types::credentials::Credentials;
use tracing::debug;

use crate::compare::constant_time_eq;
use crate::digest::hmac_sha256;

pub const HEADER_WEBHOOK_SIGNATURE: &str = "x-polymarket-signature";
pub const HEADER_WEBHOOK_TIMESTAMP: &str = "x-polymarket-timestamp";

/// Maximum allowed distance between the callback timestamp and now, in
/// either direction.
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// One inbound signed callback. Validated, never stored.
#[derive(Debug, Clone, Copy)]
pub struct WebhookEnvelope<'a> {
    pub signature: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub body: &'a [u8],
}

/// Why a webhook was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationFailure {
    #[error("Missing webhook signature")]
    MissingSignature,

    #[error("Webhook timestamp expired")]
    Expired { skew_secs: u64 },

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Failed to verify webhook: {0}")]
    VerificationError(String),
}

impl VerificationFailure {
    /// Caller fault (401) as opposed to a verification fault (500).
    pub fn is_unauthorized(&self) -> bool {
        !matches!(self, VerificationFailure::VerificationError(_))
    }
}

/// Verify `envelope` against `secret` at `now_secs`.
pub fn verify_webhook(
    secret: &[u8],
    envelope: &WebhookEnvelope<'_>,
    now_secs: i64,
    tolerance_secs: u64,
) -> Result<(), VerificationFailure> {
    let (signature, timestamp) = match (envelope.signature, envelope.timestamp) {
        (Some(sig), Some(ts)) if !sig.is_empty() && !ts.is_empty() => (sig, ts),
        _ => return Err(VerificationFailure::MissingSignature),
    };

    let sent_at: i64 = timestamp.trim().parse().map_err(|_| {
        VerificationFailure::VerificationError(format!("unparseable timestamp {:?}", timestamp))
    })?;

    let skew_secs = now_secs.abs_diff(sent_at);
    if skew_secs > tolerance_secs {
        return Err(VerificationFailure::Expired { skew_secs });
    }

    let tag = hmac_sha256(secret, &[timestamp.as_bytes(), envelope.body])
        .map_err(|e| VerificationFailure::VerificationError(e.to_string()))?;
    let expected = hex::encode(tag);

    if !constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
        return Err(VerificationFailure::InvalidSignature);
    }

    debug!(skew_secs, body_len = envelope.body.len(), "Webhook signature verified");
    Ok(())
}

/// Verifies inbound callbacks with a fixed secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
    tolerance_secs: u64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Verifier keyed by the exchange API secret.
    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self::new(credentials.api_secret.as_bytes())
    }

    pub fn with_tolerance(mut self, tolerance_secs: u64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    pub fn tolerance_secs(&self) -> u64 {
        self.tolerance_secs
    }

    pub fn verify(&self, envelope: &WebhookEnvelope<'_>) -> Result<(), VerificationFailure> {
        self.verify_at(envelope, unix_seconds())
    }

    pub fn verify_at(
        &self,
        envelope: &WebhookEnvelope<'_>,
        now_secs: i64,
    ) -> Result<(), VerificationFailure> {
        verify_webhook(&self.secret, envelope, now_secs, self.tolerance_secs)
    }

    /// Hex signature the exchange would send for `(timestamp, body)`.
    pub fn expected_signature(
        &self,
        timestamp: &str,
        body: &[u8],
    ) -> Result<String, VerificationFailure> {
        hmac_sha256(&self.secret, &[timestamp.as_bytes(), body])
            .map(hex::encode)
            .map_err(|e| VerificationFailure::VerificationError(e.to_string()))
    }
}

impl fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"***REDACTED***")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}
