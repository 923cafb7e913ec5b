use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use idcard_ocr::app_state::AppState;
use idcard_ocr::config::AppConfig;
use idcard_ocr::routes::{self, metrics::MetricsState};
use idcard_ocr::services::job_store;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!(
        engine_url = %config.engine_url,
        sync_mode = config.sync_mode,
        max_jobs = config.max_jobs,
        "Initializing idcard-ocr server"
    );

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("ocr_jobs_submitted_total", "Uploads received");
    metrics::describe_counter!("ocr_jobs_rejected_total", "Uploads rejected by pre-flight checks");
    metrics::describe_counter!("ocr_jobs_completed_total", "Jobs finished as done");
    metrics::describe_counter!("ocr_jobs_failed_total", "Jobs finished as error");
    metrics::describe_histogram!("ocr_engine_call_seconds", "Duration of OCR engine calls");
    metrics::describe_gauge!("ocr_jobs_in_store", "Jobs currently held in memory");
    metrics::describe_gauge!("ocr_jobs_in_flight", "Jobs pending or processing");

    let bind_addr = config.bind_addr.clone();
    let retention = config.retention();
    let sweep_interval = config.sweep_interval();

    let state = AppState::new(config).expect("Failed to initialize application state");

    let _sweeper = job_store::spawn_eviction(Arc::clone(&state.jobs), retention, sweep_interval);

    let metrics_state = MetricsState {
        handle: prometheus_handle,
        jobs: Arc::clone(&state.jobs),
    };

    let app = routes::router(state).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(metrics_state),
    );

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
