use axum::{Json, extract::State};
use chrono::{SecondsFormat, Utc};
use market_data::ConnectionState;
use market_data::metrics::MetricsSnapshot;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the gateway started.
    pub uptime: f64,
    pub mirror: MirrorHealth,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorHealth {
    pub state: ConnectionState,
    pub subscribers: usize,
    pub connect_attempts: u64,
    pub generation: u64,
    pub metrics: MetricsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let mirror = &state.mirror;
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.started_at.elapsed().as_secs_f64(),
        mirror: MirrorHealth {
            state: mirror.state(),
            subscribers: mirror.subscriber_count(),
            connect_attempts: mirror.connect_attempts(),
            generation: mirror.generation(),
            metrics: mirror.metrics(),
        },
    })
}
