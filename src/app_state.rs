use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    encryption::{EncryptionError, EncryptionService},
    job_store::JobStore,
    ocr::{RecognitionClient, RecognitionEngine, TransportError},
    runner::JobRunner,
};

/// Shared application state passed to all route handlers.
///
/// The job store lives here for the whole process and is never persisted.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jobs: Arc<JobStore>,
    pub runner: Arc<JobRunner>,
}

impl AppState {
    /// Wire up the store, engine client and runner from configuration.
    pub fn new(config: AppConfig) -> Result<Self, StartupError> {
        let engine = RecognitionClient::new(config.engine_url.clone(), config.engine_timeout())?;
        Self::with_engine(config, Arc::new(engine))
    }

    /// Same as [`AppState::new`] with a caller-supplied engine.
    pub fn with_engine(
        config: AppConfig,
        engine: Arc<dyn RecognitionEngine>,
    ) -> Result<Self, StartupError> {
        let sealer = EncryptionService::from_optional_key(config.encryption_key.as_deref())?;
        let jobs = Arc::new(JobStore::new(config.max_jobs, sealer));
        let runner = Arc::new(JobRunner::new(Arc::clone(&jobs), engine));

        Ok(Self {
            config: Arc::new(config),
            jobs,
            runner,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to initialize upload sealing: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("Failed to initialize OCR engine client: {0}")]
    Engine(#[from] TransportError),
}
