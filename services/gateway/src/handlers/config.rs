use axum::{Json, extract::State};
use relay_types::credentials::RedactedCredentials;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub status: &'static str,
    pub config: RedactedCredentials,
}

/// Sanitized credential summary. Secrets never leave the process.
pub async fn show_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        status: "ok",
        config: state.credentials.redacted(),
    })
}
