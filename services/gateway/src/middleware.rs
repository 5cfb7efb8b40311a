//! Rate-limit middleware
//!
//! Installed once per policy with `from_fn_with_state`. Layers nest, so the
//! innermost (most specific) limiter writes the `X-RateLimit-*` headers first
//! and outer limiters only fill in headers that are still missing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    RequestExt,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use relay_types::ids::ClientKey;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::rate_limit::{FixedWindowLimiter, RateLimitDecision};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Identify the caller by peer IP, or `unknown` when the transport gives none.
pub async fn client_key(request: &mut Request) -> ClientKey {
    match request.extract_parts::<ConnectInfo<SocketAddr>>().await {
        Ok(ConnectInfo(addr)) => ClientKey::from(addr.ip()),
        Err(_) => ClientKey::unknown(),
    }
}

pub async fn enforce_rate_limit(
    State(limiter): State<Arc<FixedWindowLimiter>>,
    mut request: Request,
    next: Next,
) -> Response {
    let key = client_key(&mut request).await;
    let decision = limiter.check(&key);

    if !decision.allowed {
        warn!(
            client_id = %key,
            limiter = limiter.name(),
            retry_after = decision.retry_after_secs,
            "Rate limit exceeded"
        );
        return AppError::RateLimitExceeded {
            message: limiter.config().message.clone(),
            decision,
        }
        .into_response();
    }

    debug!(
        client_id = %key,
        limiter = limiter.name(),
        remaining = decision.remaining,
        "Rate limit check passed"
    );

    let mut response = next.run(request).await;

    if limiter.config().skip_successful_requests && response.status().as_u16() < 400 {
        limiter.release(&key, &decision);
    }

    fill_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Set every rate-limit header, replacing existing values.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    for (name, value) in header_values(decision) {
        headers.insert(name, value);
    }
}

/// Set rate-limit headers that an inner limiter has not already set.
fn fill_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    for (name, value) in header_values(decision) {
        headers.entry(name).or_insert(value);
    }
}

fn header_values(decision: &RateLimitDecision) -> Vec<(HeaderName, HeaderValue)> {
    let mut values = vec![
        (X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit)),
        (X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining)),
        (X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at_ms)),
    ];
    if !decision.allowed {
        values.push((header::RETRY_AFTER, HeaderValue::from(decision.retry_after_secs)));
    }
    values
}
