use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::services::job_store::JobStore;

/// State for the scrape endpoint, kept apart from the API state.
#[derive(Clone)]
pub struct MetricsState {
    pub handle: Arc<PrometheusHandle>,
    pub jobs: Arc<JobStore>,
}

/// GET /metrics — Prometheus text exposition.
/// Store gauges are refreshed on every scrape.
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    let stats = state.jobs.stats().await;
    metrics::gauge!("ocr_jobs_in_store").set(stats.total as f64);
    metrics::gauge!("ocr_jobs_in_flight").set((stats.pending + stats.processing) as f64);
    state.handle.render()
}
