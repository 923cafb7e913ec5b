use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use super::{StatusPayload, StatusReply, StatusSource};
use crate::models::job::JobState;

/// Reads job status from a running gateway over HTTP.
#[derive(Clone)]
pub struct HttpStatusSource {
    http: Client,
    base_url: String,
}

impl HttpStatusSource {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self, job_id: &str) -> Result<StatusReply, ClientError> {
        let response = self
            .http
            .get(format!("{}/status/{}", self.base_url, job_id))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(StatusReply::NotFound),
            status if status.is_success() => Ok(StatusReply::Found(response.json().await?)),
            status => Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// What the gateway answered to an upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadReply {
    /// Async mode: poll this id.
    Queued { job_id: String },
    /// The response already carries a final state: sync mode or a rejected upload.
    Finished { job_id: String, payload: StatusPayload },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadBody {
    job_id: Option<String>,
    status: Option<JobState>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Upload one image file to `POST {base_url}/upload`.
pub async fn submit_upload(
    http: &Client,
    base_url: &str,
    image_path: &Path,
    sync: bool,
) -> Result<UploadReply, ClientError> {
    let bytes = tokio::fs::read(image_path).await?;
    let file_name = image_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.jpg")
        .to_string();
    let mime = match image_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    };

    let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name).mime_str(mime)?);
    let mut request = http
        .post(format!("{}/upload", base_url.trim_end_matches('/')))
        .multipart(form);
    if sync {
        request = request.query(&[("mode", "sync")]);
    }

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    let body: UploadBody = serde_json::from_str(&text).map_err(|_| ClientError::UnexpectedStatus {
        status: status.as_u16(),
        body: text.clone(),
    })?;

    match (body.job_id, body.status) {
        (Some(job_id), Some(state)) if state.is_terminal() => Ok(UploadReply::Finished {
            job_id,
            payload: StatusPayload {
                status: state,
                result: body.result,
                error: body.error,
            },
        }),
        (Some(job_id), _) if status.is_success() => Ok(UploadReply::Queued { job_id }),
        _ => Err(ClientError::Rejected {
            status: status.as_u16(),
            message: body.error.unwrap_or(text),
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read image file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Upload refused with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
}
