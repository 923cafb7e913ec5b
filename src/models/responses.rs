use serde::{Deserialize, Serialize};

use crate::models::job::{Job, JobId, JobState};
use crate::models::recognition::RecognitionResult;

/// Body returned by `POST /upload` and `GET /status/{jobId}`.
///
/// An async upload carries only `jobId` and `status`; a synchronous upload or a
/// finished job also carries `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub job_id: JobId,
    pub status: JobState,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<RecognitionResult>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl JobResponse {
    /// Reply for a freshly queued job.
    pub fn accepted(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobState::Pending,
            result: None,
            error: None,
        }
    }
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            status: job.state,
            result: job.result,
            error: job.error,
        }
    }
}

/// Error body for failures that happen before a job exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
