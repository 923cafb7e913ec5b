//! Client side of the job protocol.
//!
//! [`StatusPoller`] asks a [`StatusSource`] for a job's state once per interval
//! until the job finishes, the time budget runs out, or the shared
//! [`CancelFlag`] is raised.

pub mod http;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::models::job::JobState;
use crate::models::recognition::resolve_masked_text;

pub use http::{submit_upload, ClientError, HttpStatusSource, UploadReply};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const POLL_BUDGET: Duration = Duration::from_secs(120);

/// Status body as the client receives it. `result` stays untyped because
/// `masked_text` may arrive in several shapes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusPayload {
    pub status: JobState,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusReply {
    Found(StatusPayload),
    NotFound,
}

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, job_id: &str) -> Result<StatusReply, ClientError>;
}

/// Cooperative stop signal shared between a poller and whoever owns it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A finished job's result with `masked_text` normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub masked_text: String,
    pub fields: Value,
    pub validation: Value,
}

impl ScanResult {
    pub fn from_result_value(result: Option<&Value>) -> Self {
        let field = |name: &str| {
            result
                .and_then(|r| r.get(name))
                .cloned()
                .unwrap_or(Value::Null)
        };
        Self {
            masked_text: resolve_masked_text(&field("masked_text")),
            fields: field("json"),
            validation: field("validation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Done(ScanResult),
    /// The server finished the job as `error` or `rejected`.
    Failed { status: JobState, message: String },
    NotFound,
    /// The client gave up; the job may still be running server-side.
    Timeout { elapsed: Duration },
    Cancelled,
}

impl PollOutcome {
    /// One-line text suitable for showing to a user.
    pub fn describe(&self) -> String {
        match self {
            PollOutcome::Done(result) => result.masked_text.clone(),
            PollOutcome::Failed { status, message } => format!("{status}: {message}"),
            PollOutcome::NotFound => "job not found".to_string(),
            PollOutcome::Timeout { elapsed } => format!(
                "timed out after {}s waiting for the result",
                elapsed.as_secs()
            ),
            PollOutcome::Cancelled => "cancelled".to_string(),
        }
    }
}

pub struct StatusPoller<S> {
    source: S,
    interval: Duration,
    budget: Duration,
    cancel: CancelFlag,
}

impl<S: StatusSource> StatusPoller<S> {
    pub fn new(source: S, cancel: CancelFlag) -> Self {
        Self {
            source,
            interval: POLL_INTERVAL,
            budget: POLL_BUDGET,
            cancel,
        }
    }

    pub fn with_timing(mut self, interval: Duration, budget: Duration) -> Self {
        self.interval = interval;
        self.budget = budget;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Poll until a terminal state, `NotFound`, budget exhaustion or cancellation.
    ///
    /// A failed individual query is logged and retried on the next tick.
    pub async fn poll(&self, job_id: &str) -> PollOutcome {
        let started = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!(job_id, "Polling cancelled");
                return PollOutcome::Cancelled;
            }

            let remaining = self.budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return self.timed_out(job_id, started);
            }

            match tokio::time::timeout(remaining, self.source.fetch(job_id)).await {
                Err(_) => return self.timed_out(job_id, started),
                Ok(Ok(StatusReply::NotFound)) => return PollOutcome::NotFound,
                Ok(Ok(StatusReply::Found(payload))) => match payload.status {
                    JobState::Done => {
                        return PollOutcome::Done(ScanResult::from_result_value(
                            payload.result.as_ref(),
                        ))
                    }
                    status @ (JobState::Error | JobState::Rejected) => {
                        return PollOutcome::Failed {
                            status,
                            message: payload
                                .error
                                .unwrap_or_else(|| format!("job finished as {status}")),
                        }
                    }
                    JobState::Pending | JobState::Processing => {
                        tracing::trace!(job_id, status = %payload.status, "Job not finished yet");
                    }
                },
                Ok(Err(e)) => {
                    tracing::warn!(job_id, error = %e, "Status query failed, will retry");
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    fn timed_out(&self, job_id: &str, started: Instant) -> PollOutcome {
        let elapsed = started.elapsed();
        tracing::warn!(job_id, elapsed_secs = elapsed.as_secs(), "Gave up waiting for job");
        PollOutcome::Timeout { elapsed }
    }
}
