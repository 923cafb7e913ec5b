use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::models::responses::ErrorResponse;
use crate::services::job_store::StoreError;

/// Errors that surface directly as HTTP responses.
///
/// Once a job exists its failures are recorded on the job instead.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::NotFound(_) | StoreError::NoSource(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Store(StoreError::ResourceExhausted { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(StoreError::InvalidTransition { .. } | StoreError::Sealing(_))
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match status {
            StatusCode::NOT_FOUND => "not found".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %self, "Internal error while handling request");
                "internal error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
