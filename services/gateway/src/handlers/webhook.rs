use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use relay_signing::WebhookEnvelope;
use relay_signing::webhook::{HEADER_WEBHOOK_SIGNATURE, HEADER_WEBHOOK_TIMESTAMP};
use serde_json::{Value, json};
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

/// Verified exchange callback. The signature covers the raw body bytes, so
/// the body is taken unparsed.
pub async fn polymarket_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let envelope = WebhookEnvelope {
        signature: header_str(&headers, HEADER_WEBHOOK_SIGNATURE),
        timestamp: header_str(&headers, HEADER_WEBHOOK_TIMESTAMP),
        body: &body,
    };
    state.verifier.verify(&envelope)?;

    let event: Option<Value> = serde_json::from_slice(&body).ok();
    let event_type = event
        .as_ref()
        .and_then(|e| e.get("event").or_else(|| e.get("type")))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    info!(event_type, body_len = body.len(), "Verified webhook received");

    Ok(Json(json!({
        "status": "ok",
        "message": "Webhook processed"
    })))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
