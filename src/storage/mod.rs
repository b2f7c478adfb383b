//! Artifact storage for encoded audio.
//!
//! Uploads are best effort: a failed upload fails the job, and a URL is
//! recorded only after the upload succeeded.

pub mod local;
pub mod s3;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AudioFormat, JobId};

pub use local::LocalStorage;
pub use s3::S3Storage;

/// Durable storage returning a retrievable URL per artifact.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `bytes` under `key` and returns the artifact URL.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}

/// Object key for a job's artifact, e.g. `jobs/17.mp3`.
pub fn artifact_key(id: &JobId, format: AudioFormat) -> String {
    format!("jobs/{}.{}", id, format.extension())
}

/// Joins a public base URL and an object key.
pub(crate) fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}
