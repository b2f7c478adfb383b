//! Job store client abstraction.
//!
//! The job store (the job tracking API) owns every job record. The worker
//! fetches a fresh view per processing attempt and pushes state changes as
//! partial patches; it never caches records across jobs.

pub mod http;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Job, JobId, JobPatch};

pub use http::HttpJobStore;

/// Read/write access to job records.
///
/// Every call returns an explicit outcome so the processor can branch on
/// failures deterministically.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetches a job by id (`GET /api/jobs/{id}`).
    async fn fetch(&self, id: &JobId) -> Result<Job>;

    /// Lists all jobs (`GET /api/jobs`). Only used in fallback mode.
    async fn list(&self) -> Result<Vec<Job>>;

    /// Sends changed fields (`PATCH /api/jobs/{id}`).
    async fn patch(&self, id: &JobId, patch: &JobPatch) -> Result<()>;
}
