use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use tracing::warn;

use scanward_core::{
    api::types::{HealthResponse, HealthStatus},
    queue::heartbeat_is_fresh,
};

use crate::infra::app_state::AppState;

/// Healthy iff some worker recorded a heartbeat within the configured window.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let latest = match state.workers.latest_heartbeat().await {
        Ok(latest) => latest,
        Err(err) => {
            warn!(error = %err, "failed to read worker heartbeats");
            None
        }
    };

    if heartbeat_is_fresh(latest, Utc::now(), state.heartbeat_window()) {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: HealthStatus::Healthy,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: HealthStatus::Unhealthy,
            }),
        )
    }
}
