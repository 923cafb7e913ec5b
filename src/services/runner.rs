use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

use crate::models::job::{Job, JobId, JobTransition};
use crate::models::recognition::RecognitionResult;
use crate::services::job_store::{JobStore, StoreError};
use crate::services::ocr::RecognitionEngine;

/// Drives a job from `pending` to `done` or `error`.
///
/// A failed engine call is final: the client resubmits to retry.
pub struct JobRunner {
    jobs: Arc<JobStore>,
    engine: Arc<dyn RecognitionEngine>,
}

impl JobRunner {
    pub fn new(jobs: Arc<JobStore>, engine: Arc<dyn RecognitionEngine>) -> Self {
        Self { jobs, engine }
    }

    /// Run the job on its own task, detached from the caller.
    pub fn dispatch(self: &Arc<Self>, id: JobId) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = runner.run(id).await {
                tracing::error!(job_id = %id, error = %e, "Job runner aborted");
            }
        })
    }

    /// Run the job to completion and return its terminal snapshot.
    ///
    /// Claiming the job via `pending -> processing` fails for any second
    /// caller, so there is never more than one engine call per job.
    pub async fn run(&self, id: JobId) -> Result<Job, StoreError> {
        self.jobs.transition(id, JobTransition::Processing).await?;
        tracing::info!(job_id = %id, "Processing recognition job");

        let source = match self.jobs.source_image(id).await {
            Ok(source) => source,
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Retained image unavailable");
                metrics::counter!("ocr_jobs_failed_total").increment(1);
                return self
                    .jobs
                    .transition(id, JobTransition::Error(format!("image unavailable: {e}")))
                    .await;
            }
        };

        let bytes = source.bytes.len();
        let start = Instant::now();
        let outcome = self
            .engine
            .recognize(source.bytes, &source.file_name, &source.content_type)
            .await;
        let elapsed = start.elapsed();
        metrics::histogram!("ocr_engine_call_seconds").record(elapsed.as_secs_f64());

        let transition = match outcome {
            Ok(body) => {
                let result = RecognitionResult::from_engine_body(&body);
                tracing::info!(
                    job_id = %id,
                    bytes,
                    duration_ms = elapsed.as_millis() as u64,
                    fields = result.json.as_object().map_or(0, |fields| fields.len()),
                    "Recognition complete"
                );
                metrics::counter!("ocr_jobs_completed_total").increment(1);
                JobTransition::Done(result)
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %id,
                    duration_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Recognition failed"
                );
                metrics::counter!("ocr_jobs_failed_total").increment(1);
                JobTransition::Error(format!("recognition failed: {e}"))
            }
        };

        self.jobs.transition(id, transition).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobState;
    use crate::services::encryption::EncryptionService;
    use crate::services::job_store::SourceImage;
    use crate::services::ocr::TransportError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Engine double that records what it received.
    struct FakeEngine {
        reply: Result<String, u16>,
        calls: AtomicUsize,
        received: Mutex<Vec<(usize, String, String)>>,
    }

    impl FakeEngine {
        fn replying(body: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(body.to_string()),
                calls: AtomicUsize::new(0),
                received: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                calls: AtomicUsize::new(0),
                received: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RecognitionEngine for FakeEngine {
        async fn recognize(
            &self,
            image: Vec<u8>,
            file_name: &str,
            content_type: &str,
        ) -> Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.received.lock().unwrap().push((
                image.len(),
                file_name.to_string(),
                content_type.to_string(),
            ));
            match &self.reply {
                Ok(body) => Ok(body.clone()),
                Err(status) => Err(TransportError::Status {
                    status: *status,
                    body: "engine exploded".to_string(),
                }),
            }
        }
    }

    /// Engine double that holds the call open until released.
    #[derive(Default)]
    struct GatedEngine {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RecognitionEngine for GatedEngine {
        async fn recognize(
            &self,
            _image: Vec<u8>,
            _file_name: &str,
            _content_type: &str,
        ) -> Result<String, TransportError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(r#"{"text":"released"}"#.to_string())
        }
    }

    async fn setup(engine: Arc<FakeEngine>) -> (Arc<JobStore>, Arc<JobRunner>, JobId) {
        let jobs = Arc::new(JobStore::new(16, EncryptionService::ephemeral()));
        let runner = Arc::new(JobRunner::new(Arc::clone(&jobs), engine));
        let id = jobs
            .create(SourceImage {
                bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 9, 9],
                file_name: "front.jpg".to_string(),
                content_type: "image/jpeg".to_string(),
            })
            .await
            .unwrap()
            .id;
        (jobs, runner, id)
    }

    #[tokio::test]
    async fn successful_call_finishes_done() {
        let engine = FakeEngine::replying(r#"{"text":"ok"}"#);
        let (jobs, runner, id) = setup(Arc::clone(&engine)).await;

        let job = runner.run(id).await.unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.result.as_ref().unwrap().masked_text, "ok");
        assert!(job.error.is_none());
        assert_eq!(jobs.get(id).await.unwrap(), job);

        let received = engine.received.lock().unwrap().clone();
        assert_eq!(
            received,
            vec![(6, "front.jpg".to_string(), "image/jpeg".to_string())]
        );
    }

    #[tokio::test]
    async fn engine_failure_finishes_error_without_retry() {
        let engine = FakeEngine::failing(502);
        let (_, runner, id) = setup(Arc::clone(&engine)).await;

        let job = runner.run(id).await.unwrap();
        assert_eq!(job.state, JobState::Error);
        assert!(job.result.is_none());
        let message = job.error.unwrap();
        assert!(message.contains("502"), "{message}");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_run_is_refused() {
        let engine = FakeEngine::replying("text");
        let (_, runner, id) = setup(Arc::clone(&engine)).await;

        runner.run(id).await.unwrap();
        let err = runner.run(id).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispatch_completes_in_background() {
        let engine = FakeEngine::replying("plain text");
        let (jobs, runner, id) = setup(engine).await;

        runner.dispatch(id).await.unwrap();
        let job = jobs.get(id).await.unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.result.unwrap().masked_text, "plain text");
    }

    #[tokio::test]
    async fn missing_image_fails_the_job() {
        let engine = FakeEngine::replying("unused");
        let jobs = Arc::new(JobStore::new(4, EncryptionService::ephemeral()));
        let runner = JobRunner::new(Arc::clone(&jobs), engine.clone());
        let id = jobs.create_without_source().await.unwrap().id;

        let job = runner.run(id).await.unwrap();
        assert_eq!(job.state, JobState::Error);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn job_passes_through_processing_while_engine_is_busy() {
        let engine = Arc::new(GatedEngine::default());
        let jobs = Arc::new(JobStore::new(4, EncryptionService::ephemeral()));
        let runner = Arc::new(JobRunner::new(Arc::clone(&jobs), engine.clone()));
        let id = jobs
            .create(SourceImage {
                bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2],
                file_name: "back.jpg".to_string(),
                content_type: "image/jpeg".to_string(),
            })
            .await
            .unwrap()
            .id;
        assert_eq!(jobs.get(id).await.unwrap().state, JobState::Pending);

        let handle = runner.dispatch(id);
        engine.entered.notified().await;
        let busy = jobs.get(id).await.unwrap();
        assert_eq!(busy.state, JobState::Processing);
        assert!(busy.result.is_none());
        assert!(busy.error.is_none());

        engine.release.notify_one();
        handle.await.unwrap();
        let job = jobs.get(id).await.unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.result.unwrap().masked_text, "released");
    }
}
