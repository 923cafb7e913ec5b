use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::job_store::JobStats;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sync_mode: bool,
    pub jobs: JobStats,
}

/// GET /health — liveness plus a snapshot of the job store.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sync_mode: state.config.sync_mode,
        jobs: state.jobs.stats().await,
    })
}
