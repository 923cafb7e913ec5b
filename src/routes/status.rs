use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;
use axum::Json;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::job::JobId;
use crate::models::responses::JobResponse;

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound)
}

/// GET /status/{job_id} — current state, plus result or error once finished.
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.jobs.get(parse_job_id(&job_id)?).await?;
    Ok(Json(JobResponse::from(job)))
}

/// GET /files/{job_id} — the image originally uploaded for a job.
pub async fn job_file(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let source = state.jobs.source_image(parse_job_id(&job_id)?).await?;

    Response::builder()
        .header(header::CONTENT_TYPE, source.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", source.file_name.replace('"', "")),
        )
        .body(Body::from(source.bytes))
        .map_err(|e| ApiError::Internal(format!("failed to build file response: {e}")))
}
