use axum::{
    Json,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use relay_signing::{SigningError, VerificationFailure};
use relay_types::errors::ConfigurationError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::middleware::apply_rate_limit_headers;
use crate::rate_limit::RateLimitDecision;

/// Central error type for the Gateway application
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Server configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Verification error: {0}")]
    Verification(String),

    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        message: String,
        decision: RateLimitDecision,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<SigningError> for AppError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::Configuration(e) => AppError::Configuration(e),
            SigningError::Authentication(msg) => AppError::Authentication(msg),
        }
    }
}

impl From<VerificationFailure> for AppError {
    fn from(failure: VerificationFailure) -> Self {
        if failure.is_unauthorized() {
            AppError::Unauthorized(failure.to_string())
        } else {
            AppError::Verification(failure.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Detail for server faults goes to the log, not the client.
        match &self {
            AppError::Unauthorized(_)
            | AppError::BadRequest(_)
            | AppError::RateLimitExceeded { .. } => warn!(error = %self, "Request rejected"),
            _ => error!(error = %self, "Request failed"),
        }

        let (status, code, message) = match self {
            AppError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error",
                "Polymarket credentials not configured".to_string(),
            ),
            AppError::Authentication(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication error",
                "Failed to sign request".to_string(),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "Unauthorized", msg),
            AppError::Verification(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification error",
                "Failed to verify webhook".to_string(),
            ),
            AppError::RateLimitExceeded { message, decision } => {
                let mut headers = HeaderMap::new();
                apply_rate_limit_headers(&mut headers, &decision);
                let body = Json(json!({
                    "error": "Too Many Requests",
                    "message": message,
                    "retryAfter": decision.retry_after_secs,
                }));
                return (StatusCode::TOO_MANY_REQUESTS, headers, body).into_response();
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", msg),
            AppError::BadGateway(_) => (
                StatusCode::BAD_GATEWAY,
                "Bad gateway",
                "Exchange API unavailable".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "An error occurred".to_string(),
            ),
        };

        let body = Json(json!({
            "error": code,
            "message": message
        }));

        (status, body).into_response()
    }
}
