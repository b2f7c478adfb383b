//! Worker configuration module.
//!
//! Contains the runtime configuration for the worker: where the job store
//! and the generation endpoint live, how the work queue is consumed, and
//! where encoded artifacts are stored. Every setting has a default suitable
//! for local operation.

use std::path::PathBuf;
use std::time::Duration;

use crate::queue::QueueMode;

/// Default job tracking API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Default Redis connection string.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Default work queue name.
pub const DEFAULT_QUEUE_NAME: &str = "jobs";

/// Default model used when a job does not name one.
pub const DEFAULT_MODEL: &str = "facebook/musicgen-medium";

/// Default generation endpoint.
pub const DEFAULT_GENERATION_URL: &str = "http://localhost:8000";

/// Default S3 bucket.
pub const DEFAULT_S3_BUCKET: &str = "music-gen-bucket";

/// Default GPU identifier expected from the generation endpoint.
pub const DEFAULT_GPU: &str = "T4";

/// Where encoded artifacts are uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// Files under a local directory.
    #[default]
    Local,
    /// Objects in an S3 bucket.
    S3,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Local => "local",
            StorageBackend::S3 => "s3",
        }
    }

    /// Parses a storage backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "fs" | "file" => Some(StorageBackend::Local),
            "s3" => Some(StorageBackend::S3),
            _ => None,
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Work queue consumption settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// Redis connection string.
    pub redis_url: String,
    /// Name of the Redis list holding job ids.
    pub name: String,
    /// Consumption mode preference.
    pub mode: QueueMode,
    /// Maximum wait of a single blocking pop.
    pub block_timeout: Duration,
    /// Interval between job store polls in fallback mode.
    pub poll_interval: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            name: DEFAULT_QUEUE_NAME.to_string(),
            mode: QueueMode::Auto,
            block_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Artifact storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Bucket used by [`StorageBackend::S3`].
    pub s3_bucket: String,
    /// Directory used by [`StorageBackend::Local`].
    /// If None, uses the platform-specific default data location.
    pub local_dir: Option<PathBuf>,
    /// Prefix for artifact URLs, e.g. a CDN in front of the bucket.
    pub public_base_url: Option<String>,
}

/// Runtime configuration for the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Job tracking API base URL.
    pub api_url: String,

    /// Generation endpoint base URL.
    pub generation_url: String,

    /// GPU/backend identifier the generation endpoint is expected to report.
    pub gpu: String,

    /// Model used when a job does not name one.
    pub default_model: String,

    /// Transcoder program for MP3 output.
    pub ffmpeg_path: PathBuf,

    /// Backoff after transient infrastructure errors.
    pub retry_backoff: Duration,

    /// Timeout for job store requests.
    pub store_timeout: Duration,

    /// Timeout for one generation call.
    pub generation_timeout: Duration,

    pub queue: QueueSettings,

    pub storage: StorageSettings,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            generation_url: DEFAULT_GENERATION_URL.to_string(),
            gpu: DEFAULT_GPU.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            retry_backoff: Duration::from_secs(5),
            store_timeout: Duration::from_secs(10),
            generation_timeout: Duration::from_secs(600),
            queue: QueueSettings::default(),
            storage: StorageSettings {
                s3_bucket: DEFAULT_S3_BUCKET.to_string(),
                ..Default::default()
            },
        }
    }
}

impl WorkerConfig {
    /// Creates a new WorkerConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a WorkerConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `API_URL` - Job tracking API base URL
    /// - `REDIS_URL` - Work queue connection string
    /// - `QUEUE_NAME` - Redis list holding job ids
    /// - `QUEUE_MODE` - auto, broker or poll
    /// - `QUEUE_BLOCK_TIMEOUT_SECS` - Blocking pop timeout
    /// - `POLL_INTERVAL_SECS` - Fallback poll interval
    /// - `RETRY_BACKOFF_SECS` - Backoff after transient errors
    /// - `MODEL_NAME` - Default model
    /// - `GENERATION_URL` - Generation endpoint base URL
    /// - `GENERATION_TIMEOUT_SECS` - Timeout for one generation call
    /// - `MODAL_GPU` - Expected GPU identifier
    /// - `STORAGE_BACKEND` - local or s3
    /// - `S3_BUCKET` - Bucket for s3 storage
    /// - `STORAGE_DIR` - Directory for local storage
    /// - `PUBLIC_BASE_URL` - Prefix for artifact URLs
    /// - `FFMPEG_PATH` - Transcoder program
    ///
    /// Falls back to defaults for unset or unparsable variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str| {
            var(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
        };

        if let Some(url) = var("API_URL") {
            config.api_url = url;
        }
        if let Some(url) = var("REDIS_URL") {
            config.queue.redis_url = url;
        }
        if let Some(name) = var("QUEUE_NAME") {
            config.queue.name = name;
        }
        if let Some(mode) = var("QUEUE_MODE").and_then(|m| QueueMode::parse(&m)) {
            config.queue.mode = mode;
        }
        if let Some(timeout) = secs("QUEUE_BLOCK_TIMEOUT_SECS") {
            config.queue.block_timeout = timeout;
        }
        if let Some(interval) = secs("POLL_INTERVAL_SECS") {
            config.queue.poll_interval = interval;
        }
        if let Some(backoff) = secs("RETRY_BACKOFF_SECS") {
            config.retry_backoff = backoff;
        }
        if let Some(model) = var("MODEL_NAME") {
            config.default_model = model;
        }
        if let Some(url) = var("GENERATION_URL") {
            config.generation_url = url;
        }
        if let Some(timeout) = secs("GENERATION_TIMEOUT_SECS") {
            config.generation_timeout = timeout;
        }
        if let Some(gpu) = var("MODAL_GPU") {
            config.gpu = gpu;
        }
        if let Some(backend) = var("STORAGE_BACKEND").and_then(|b| StorageBackend::parse(&b)) {
            config.storage.backend = backend;
        }
        if let Some(bucket) = var("S3_BUCKET") {
            config.storage.s3_bucket = bucket;
        }
        if let Some(dir) = var("STORAGE_DIR") {
            config.storage.local_dir = Some(PathBuf::from(dir));
        }
        if let Some(base) = var("PUBLIC_BASE_URL") {
            config.storage.public_base_url = Some(base);
        }
        if let Some(path) = var("FFMPEG_PATH") {
            config.ffmpeg_path = PathBuf::from(path);
        }

        config
    }

    /// Returns the effective local storage directory, using platform defaults if not specified.
    pub fn effective_storage_dir(&self) -> PathBuf {
        if let Some(ref path) = self.storage.local_dir {
            path.clone()
        } else {
            default_storage_dir()
        }
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        for (name, url) in [
            ("API_URL", &self.api_url),
            ("GENERATION_URL", &self.generation_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Some(format!("{} must be an http(s) URL, got '{}'", name, url));
            }
        }

        if self.queue.name.trim().is_empty() {
            return Some("QUEUE_NAME cannot be empty".to_string());
        }
        if self.queue.mode != QueueMode::Poll && !self.queue.redis_url.starts_with("redis") {
            return Some(format!(
                "REDIS_URL must be a redis:// or rediss:// URL, got '{}'",
                self.queue.redis_url
            ));
        }
        if self.queue.block_timeout.is_zero() || self.queue.poll_interval.is_zero() {
            return Some("queue timeouts must be > 0".to_string());
        }
        if self.retry_backoff.is_zero() {
            return Some("RETRY_BACKOFF_SECS must be > 0".to_string());
        }
        if self.default_model.trim().is_empty() {
            return Some("MODEL_NAME cannot be empty".to_string());
        }
        if self.storage.backend == StorageBackend::S3 && self.storage.s3_bucket.trim().is_empty() {
            return Some("S3_BUCKET is required for s3 storage".to_string());
        }

        None
    }
}

/// Returns the platform-specific default artifact directory.
///
/// Uses the `directories` crate to find appropriate locations:
/// - macOS: ~/Library/Application Support/sonicforge/artifacts
/// - Linux: ~/.local/share/sonicforge/artifacts
/// - Windows: C:\Users\<user>\AppData\Roaming\sonicforge\data\artifacts
fn default_storage_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "sonicforge") {
        proj_dirs.data_dir().join("artifacts")
    } else {
        // Fallback to current directory
        PathBuf::from("./artifacts")
    }
}
