use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::models::job::{Job, JobId, JobState, JobTransition};
use crate::services::encryption::{EncryptionError, EncryptionService};

/// An uploaded image handed to the store when a job is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

struct SealedSource {
    sealed: Vec<u8>,
    file_name: String,
    content_type: String,
}

struct JobRecord {
    job: Job,
    source: Option<SealedSource>,
}

impl JobRecord {
    fn expired(&self, cutoff: DateTime<Utc>) -> bool {
        self.job.state.is_terminal() && self.job.updated_at < cutoff
    }
}

/// Per-state job counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub processing: usize,
    pub done: usize,
    pub error: usize,
    pub rejected: usize,
    pub total: usize,
}

/// Process-wide in-memory job registry.
///
/// The map lock is held only to find or insert a record; each record has its
/// own mutex, so updates to one job never wait on another.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<JobRecord>>>>,
    capacity: usize,
    sealer: EncryptionService,
}

impl JobStore {
    pub fn new(capacity: usize, sealer: EncryptionService) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            capacity,
            sealer,
        }
    }

    /// Insert a new `pending` job that owns `source`.
    pub async fn create(&self, source: SourceImage) -> Result<Job, StoreError> {
        let sealed = SealedSource {
            sealed: self.sealer.seal(&source.bytes)?,
            file_name: source.file_name,
            content_type: source.content_type,
        };
        self.insert(Some(sealed)).await
    }

    /// Insert a new `pending` job with no retained image, used for uploads
    /// that fail pre-flight checks.
    pub async fn create_without_source(&self) -> Result<Job, StoreError> {
        self.insert(None).await
    }

    async fn insert(&self, source: Option<SealedSource>) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.len() >= self.capacity {
            return Err(StoreError::ResourceExhausted {
                capacity: self.capacity,
            });
        }

        loop {
            let id = JobId::new();
            if let Entry::Vacant(slot) = jobs.entry(id) {
                let job = Job::new(id);
                slot.insert(Arc::new(Mutex::new(JobRecord {
                    job: job.clone(),
                    source,
                })));
                return Ok(job);
            }
        }
    }

    async fn record(&self, id: JobId) -> Result<Arc<Mutex<JobRecord>>, StoreError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    pub async fn get(&self, id: JobId) -> Result<Job, StoreError> {
        let record = self.record(id).await?;
        let record = record.lock().await;
        Ok(record.job.clone())
    }

    /// Atomically move a job to the transition's target state and attach its payload.
    pub async fn transition(&self, id: JobId, transition: JobTransition) -> Result<Job, StoreError> {
        let record = self.record(id).await?;
        let mut record = record.lock().await;

        record
            .job
            .apply(transition)
            .map_err(|(from, to)| StoreError::InvalidTransition { id, from, to })?;

        tracing::debug!(job_id = %id, state = %record.job.state, "Job transitioned");
        Ok(record.job.clone())
    }

    /// Decrypt and return the image retained for a job.
    pub async fn source_image(&self, id: JobId) -> Result<SourceImage, StoreError> {
        let record = self.record(id).await?;
        let record = record.lock().await;
        let source = record.source.as_ref().ok_or(StoreError::NoSource(id))?;

        Ok(SourceImage {
            bytes: self.sealer.open(&source.sealed)?,
            file_name: source.file_name.clone(),
            content_type: source.content_type.clone(),
        })
    }

    /// Drop terminal jobs whose last update is older than `retention`.
    ///
    /// Records locked by a writer are in flight and are kept.
    pub async fn evict_expired(&self, retention: Duration) -> usize {
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, record| match record.try_lock() {
            Ok(record) => !record.expired(cutoff),
            Err(_) => true,
        });
        before - jobs.len()
    }

    pub async fn stats(&self) -> JobStats {
        let records: Vec<_> = self.jobs.read().await.values().cloned().collect();

        let mut stats = JobStats {
            total: records.len(),
            ..JobStats::default()
        };
        for record in records {
            match record.lock().await.job.state {
                JobState::Pending => stats.pending += 1,
                JobState::Processing => stats.processing += 1,
                JobState::Done => stats.done += 1,
                JobState::Error => stats.error += 1,
                JobState::Rejected => stats.rejected += 1,
            }
        }
        stats
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

/// Periodically evict expired jobs until the returned task is aborted.
pub fn spawn_eviction(jobs: Arc<JobStore>, retention: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = jobs.evict_expired(retention).await;
            if evicted > 0 {
                tracing::info!(evicted, "Evicted expired jobs");
            } else {
                tracing::trace!("No expired jobs to evict");
            }
        }
    })
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job store is full ({capacity} jobs)")]
    ResourceExhausted { capacity: usize },

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobState,
        to: JobState,
    },

    #[error("job {0} has no retained image")]
    NoSource(JobId),

    #[error(transparent)]
    Sealing(#[from] EncryptionError),
}
