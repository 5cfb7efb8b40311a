use axum::{Json, extract::State, http::Method};
use serde_json::{Value, json};

use crate::error::AppError;
use crate::state::AppState;

const TEST_SIGNATURE_PATH: &str = "/api/test-signature";

/// Sign a request for this route and report which headers were produced.
pub async fn test_signature(
    State(state): State<AppState>,
    method: Method,
) -> Result<Json<Value>, AppError> {
    let signed = state.signer.sign(method.as_str(), TEST_SIGNATURE_PATH, None)?;

    let set_or_not = |value: &str| if value.is_empty() { "NOT_SET" } else { "SET" };
    Ok(Json(json!({
        "message": "Request signed successfully",
        "headers": {
            "POLY-API-KEY": set_or_not(&signed.api_key),
            "POLY-TIMESTAMP": signed.timestamp,
            "POLY-SIGNATURE": set_or_not(&signed.signature),
            "X-Builder-ID": signed.builder_id.as_deref().unwrap_or("NOT_SET"),
        }
    })))
}
