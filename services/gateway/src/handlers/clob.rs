//! Signed pass-through to the exchange REST API.

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{Method, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use relay_signing::canonical_body;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

/// Forward `/api/clob/{path}` to the exchange as `/{path}`, signed.
///
/// The signature covers the path without its query string, and the body is
/// sent exactly as it was signed.
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, AppError> {
    let body: Option<Value> = if body.is_empty() {
        None
    } else {
        Some(
            serde_json::from_slice(&body)
                .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?,
        )
    };

    let request_path = format!("/{}", path.trim_start_matches('/'));
    let signed = state.signer.sign(method.as_str(), &request_path, body.as_ref())?;
    let payload = canonical_body(body.as_ref());

    let mut url = format!("{}{}", state.config.rest_url, request_path);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(&query);
    }

    let mut upstream = state.http_client.request(method.clone(), &url);
    for (name, value) in signed.pairs() {
        upstream = upstream.header(name, value);
    }
    if !payload.is_empty() {
        upstream = upstream.header(CONTENT_TYPE, "application/json").body(payload);
    }

    debug!(%method, path = %request_path, "Proxying signed request to exchange");
    let res = upstream.send().await.map_err(|e| {
        warn!(%method, path = %request_path, error = %e, "Exchange request failed");
        AppError::BadGateway(e.to_string())
    })?;

    let status = res.status();
    let content_type = res.headers().get(CONTENT_TYPE).cloned();
    let bytes = res
        .bytes()
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;

    let mut response = (status, bytes).into_response();
    if let Some(content_type) = content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    Ok(response)
}
