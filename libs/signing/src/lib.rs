//! Signing library for the exchange relay
//!
//! Two schemes share one HMAC-SHA256 primitive but deliberately differ in
//! encoding:
//! - `request`: outbound exchange API authentication, Base64 signature over
//!   `timestamp + METHOD + path + body`
//! - `webhook`: inbound callback verification, hex signature over
//!   `timestamp + raw body`, with a replay window and constant-time compare

pub mod compare;
pub mod digest;
pub mod request;
pub mod webhook;

pub use compare::constant_time_eq;
pub use request::{
    canonical_body, sign_request, RequestSigner, SignedHeaders, SigningContext, SigningError,
};
pub use webhook::{verify_webhook, VerificationFailure, WebhookEnvelope, WebhookVerifier};

/// Signing schema version.
pub const SIGNING_SCHEMA_VERSION: &str = "1.0.0";
