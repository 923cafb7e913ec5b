use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::job::JobTransition;
use crate::models::responses::JobResponse;
use crate::services::job_store::SourceImage;
use crate::services::validation::validate_upload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Async,
    Sync,
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    pub mode: Option<UploadMode>,
}

struct UploadedFile {
    bytes: Vec<u8>,
    file_name: Option<String>,
    content_type: Option<String>,
}

/// POST /upload — submit an ID card image for recognition.
///
/// Returns 202 with `{jobId, status: "pending"}`, or in sync mode 200 with the
/// finished job. Uploads failing validation become `rejected` jobs and are
/// answered with 413/415.
pub async fn upload_image(
    State(state): State<AppState>,
    params: Result<Query<UploadParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut upload: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let file_name = field.file_name().map(str::to_owned);
            let content_type = field.content_type().map(str::to_owned);
            let bytes = field.bytes().await?;
            upload = Some(UploadedFile {
                bytes: bytes.to_vec(),
                file_name,
                content_type,
            });
        }
    }

    let upload =
        upload.ok_or_else(|| ApiError::BadRequest("missing multipart field `file`".to_string()))?;
    metrics::counter!("ocr_jobs_submitted_total").increment(1);

    let kind = match validate_upload(
        &upload.bytes,
        upload.content_type.as_deref(),
        state.config.max_upload_bytes,
    ) {
        Ok(kind) => kind,
        Err(e) => {
            let job = state.jobs.create_without_source().await?;
            let job = state
                .jobs
                .transition(job.id, JobTransition::Rejected(e.to_string()))
                .await?;
            metrics::counter!("ocr_jobs_rejected_total").increment(1);
            tracing::info!(
                job_id = %job.id,
                bytes = upload.bytes.len(),
                reason = %e,
                "Upload rejected"
            );
            return Ok((e.status_code(), Json(JobResponse::from(job))).into_response());
        }
    };

    let bytes = upload.bytes.len();
    let job = state
        .jobs
        .create(SourceImage {
            bytes: upload.bytes,
            file_name: upload
                .file_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| kind.default_file_name().to_string()),
            content_type: kind.mime_type().to_string(),
        })
        .await?;

    let sync = match params.mode {
        Some(mode) => mode == UploadMode::Sync,
        None => state.config.sync_mode,
    };
    tracing::info!(job_id = %job.id, bytes, sync, "Upload accepted");

    let finished = state.runner.dispatch(job.id);
    if sync {
        // The runner task outlives this request if the client goes away.
        finished
            .await
            .map_err(|e| ApiError::Internal(format!("job runner task failed: {e}")))?;
        let job = state.jobs.get(job.id).await?;
        return Ok((StatusCode::OK, Json(JobResponse::from(job))).into_response());
    }

    Ok((StatusCode::ACCEPTED, Json(JobResponse::accepted(job.id))).into_response())
}
