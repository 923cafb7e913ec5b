use garde::Validate;
use serde::Deserialize;
use std::time::Duration;

const MIB: usize = 1024 * 1024;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind_addr")]
    #[garde(length(min = 1))]
    pub bind_addr: String,

    /// Remote OCR engine endpoint receiving the multipart `file` upload.
    #[serde(default = "default_engine_url")]
    #[garde(length(min = 1))]
    pub engine_url: String,

    /// Upper bound on a single engine call.
    #[serde(default = "default_engine_timeout_secs")]
    #[garde(range(min = 1, max = 300))]
    pub engine_timeout_secs: u64,

    /// Largest accepted image; bigger uploads are rejected.
    #[serde(default = "default_max_upload_bytes")]
    #[garde(range(min = 1))]
    pub max_upload_bytes: usize,

    /// Hard cap on the request body, enforced before the handler runs.
    #[serde(default = "default_body_limit_bytes")]
    #[garde(range(min = 1))]
    pub body_limit_bytes: usize,

    /// Maximum number of jobs held in memory at once.
    #[serde(default = "default_max_jobs")]
    #[garde(range(min = 1))]
    pub max_jobs: usize,

    /// How long a finished job stays queryable.
    #[serde(default = "default_retention_secs")]
    #[garde(range(min = 1))]
    pub retention_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    #[garde(range(min = 1))]
    pub sweep_interval_secs: u64,

    /// Run recognition inline in the upload request instead of returning a job id.
    #[serde(default)]
    #[garde(skip)]
    pub sync_mode: bool,

    /// Single allowed browser origin. Unset means permissive CORS.
    #[serde(default)]
    #[garde(skip)]
    pub cors_allow_origin: Option<String>,

    /// AES-256-GCM key for retained uploads (base64-encoded, 32 bytes).
    /// Unset means a fresh key per process.
    #[serde(default)]
    #[garde(skip)]
    pub encryption_key: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_engine_url() -> String {
    "http://127.0.0.1:5000/ocr/thai-id/".to_string()
}

fn default_engine_timeout_secs() -> u64 {
    45
}

fn default_max_upload_bytes() -> usize {
    10 * MIB
}

fn default_body_limit_bytes() -> usize {
    32 * MIB
}

fn default_max_jobs() -> usize {
    10_000
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            engine_url: default_engine_url(),
            engine_timeout_secs: default_engine_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
            body_limit_bytes: default_body_limit_bytes(),
            max_jobs: default_max_jobs(),
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            sync_mode: false,
            cors_allow_origin: None,
            encryption_key: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.check()?;
        Ok(config)
    }

    /// Field rules plus the constraints that span several fields.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.body_limit_bytes < self.max_upload_bytes {
            return Err(ConfigError::BodyLimitTooSmall {
                body_limit: self.body_limit_bytes,
                max_upload: self.max_upload_bytes,
            });
        }
        reqwest::Url::parse(&self.engine_url)
            .map_err(|e| ConfigError::EngineUrl(e.to_string()))?;
        Ok(())
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),

    #[error("BODY_LIMIT_BYTES ({body_limit}) must be at least MAX_UPLOAD_BYTES ({max_upload})")]
    BodyLimitTooSmall { body_limit: usize, max_upload: usize },

    #[error("ENGINE_URL is not a valid URL: {0}")]
    EngineUrl(String),
}
