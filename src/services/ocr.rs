use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;

/// Longest slice of an engine error body kept in the job's error message.
const ERROR_BODY_EXCERPT: usize = 200;

/// Remote recognition engine as seen by the job runner.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Submit one image and return the engine's raw response body.
    async fn recognize(
        &self,
        image: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<String, TransportError>;
}

/// HTTP client for the ID card OCR engine.
///
/// Sends a single multipart `file` field per call. No retries and no state
/// between calls.
pub struct RecognitionClient {
    http: Client,
    endpoint: String,
    timeout: Duration,
}

impl RecognitionClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Http)?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RecognitionEngine for RecognitionClient {
    async fn recognize(
        &self,
        image: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<String, TransportError> {
        let part = Part::bytes(image)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(TransportError::Http)?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        response.text().await.map_err(|e| self.classify(e))
    }
}

impl RecognitionClient {
    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Http(err)
        }
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_BODY_EXCERPT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("OCR engine request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OCR engine returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("OCR engine did not respond within {0:?}")]
    Timeout(Duration),
}
