//! HTTP client for the job tracking API.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{ErrorCode, Result, WorkerError};
use crate::types::{Job, JobId, JobPatch};

use super::JobStore;

/// Default timeout for job store requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`JobStore`] backed by the job tracking API.
pub struct HttpJobStore {
    client: reqwest::Client,
    api_url: String,
}

impl HttpJobStore {
    /// Creates a client for the API at `api_url` (e.g. `http://localhost:5000`).
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                WorkerError::with_source(
                    ErrorCode::InvalidConfig,
                    format!("Failed to create HTTP client: {}", e),
                    e,
                )
            })?;
        Ok(Self::with_client(client, api_url))
    }

    /// Creates a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn job_url(&self, id: &JobId) -> String {
        format!("{}/api/jobs/{}", self.api_url, id)
    }

    /// Returns the response unchanged on 2xx, or a JOB_STORE_REJECTED error.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(WorkerError::job_store_rejected(status.as_u16(), &body))
    }

    /// Reads the full body and decodes it, so malformed JSON maps to MALFORMED_JOB.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let bytes = response
            .bytes()
            .await
            .map_err(WorkerError::job_store_unavailable)?;
        serde_json::from_slice(&bytes).map_err(WorkerError::malformed_job)
    }
}

#[async_trait]
impl JobStore for HttpJobStore {
    async fn fetch(&self, id: &JobId) -> Result<Job> {
        let response = self
            .client
            .get(self.job_url(id))
            .send()
            .await
            .map_err(WorkerError::job_store_unavailable)?;

        let response = Self::ensure_success(response).await?;
        Self::decode(response).await
    }

    async fn list(&self) -> Result<Vec<Job>> {
        let response = self
            .client
            .get(format!("{}/api/jobs", self.api_url))
            .send()
            .await
            .map_err(WorkerError::job_store_unavailable)?;

        let response = Self::ensure_success(response).await?;
        let records: Vec<serde_json::Value> = Self::decode(response).await?;

        // One undecodable record must not hide the others.
        let mut jobs = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_value::<Job>(record) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable job record in listing");
                }
            }
        }
        Ok(jobs)
    }

    async fn patch(&self, id: &JobId, patch: &JobPatch) -> Result<()> {
        let response = self
            .client
            .patch(self.job_url(id))
            .json(patch)
            .send()
            .await
            .map_err(WorkerError::job_store_unavailable)?;

        Self::ensure_success(response).await?;
        Ok(())
    }
}
