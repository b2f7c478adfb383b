//! Per-job state machine.
//!
//! A job moves through fetch, mark processing, generate, encode, upload and
//! resolve within a single call. Nothing is persisted between steps except
//! the two patches sent to the job store: `processing` before generation
//! starts, and exactly one terminal patch at the end.
//!
//! Failures before `processing` is recorded are skipped without touching the
//! job record. Failures after it are recorded as `failed`.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;

use crate::audio::AudioEncoder;
use crate::backend::{GenerationBackend, GenerationRequest};
use crate::error::{Result, WorkerError};
use crate::storage::{artifact_key, ArtifactStore};
use crate::store::JobStore;
use crate::types::{GenerationParams, JobId, JobPatch, JobStatus};

/// How a single job ended, from the worker's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The job record was left untouched.
    Skipped { reason: String },
    /// The job was resolved as `completed`.
    Completed { audio_url: String },
    /// The job was resolved as `failed`.
    Failed { error: String },
}

impl ProcessOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ProcessOutcome::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProcessOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ProcessOutcome::Skipped { .. })
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
            ProcessOutcome::Completed { audio_url } => write!(f, "completed: {}", audio_url),
            ProcessOutcome::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// Drives one job from its id to a terminal status.
///
/// Every collaborator is injected, so the processor holds no connection
/// state of its own and can be shared across loop iterations.
pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    backend: Arc<dyn GenerationBackend>,
    encoder: Arc<dyn AudioEncoder>,
    storage: Arc<dyn ArtifactStore>,
    default_model: String,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn JobStore>,
        backend: Arc<dyn GenerationBackend>,
        encoder: Arc<dyn AudioEncoder>,
        storage: Arc<dyn ArtifactStore>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            backend,
            encoder,
            storage,
            default_model: default_model.into(),
        }
    }

    /// Processes one job. Never returns an error: every failure is either a
    /// skip or a recorded `failed` status.
    pub async fn process(&self, id: &JobId) -> ProcessOutcome {
        let job = match self.store.fetch(id).await {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e.message, "Skipping job, fetch failed");
                return ProcessOutcome::Skipped { reason: e.message };
            }
        };

        if !job.status.can_transition_to(JobStatus::Processing) {
            let reason = format!("job is already {}", job.status.as_str());
            tracing::warn!(job_id = %id, status = job.status.as_str(), "Skipping job, not pending");
            return ProcessOutcome::Skipped { reason };
        }

        // Rejected before paying for generation.
        let params = match GenerationParams::from_job(&job, &self.default_model) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e.message, "Rejecting invalid job");
                return self.resolve(id, Err(e)).await;
            }
        };

        if let Err(e) = self
            .store
            .patch(id, &JobPatch::processing(Utc::now()))
            .await
        {
            tracing::warn!(
                job_id = %id,
                error = %e.message,
                "Skipping job, could not record processing status"
            );
            return ProcessOutcome::Skipped { reason: e.message };
        }
        tracing::info!(
            job_id = %id,
            model = %params.model,
            duration_sec = params.duration_sec,
            seed = ?params.seed,
            format = %params.format,
            backend = self.backend.id(),
            "Job processing"
        );

        let result = self.render(id, &params).await;
        self.resolve(id, result).await
    }

    /// Generates, encodes and uploads. Returns the artifact URL.
    async fn render(&self, id: &JobId, params: &GenerationParams) -> Result<String> {
        let waveform = self
            .backend
            .generate(&GenerationRequest::from(params))
            .await?;
        tracing::debug!(
            job_id = %id,
            sample_rate = waveform.sample_rate,
            channels = waveform.channels,
            seconds = waveform.duration_sec(),
            "Generated waveform"
        );

        let bytes = self.encoder.encode(&waveform, params.format).await?;
        let key = artifact_key(id, params.format);
        self.storage
            .upload(&key, bytes, params.format.content_type())
            .await
    }

    /// Sends the single terminal patch.
    ///
    /// A failed terminal patch is logged, not retried; the job stays in its
    /// previous status in the store.
    async fn resolve(&self, id: &JobId, result: Result<String>) -> ProcessOutcome {
        let (patch, outcome) = match result {
            Ok(audio_url) => (
                JobPatch::completed(audio_url.clone(), Utc::now()),
                ProcessOutcome::Completed { audio_url },
            ),
            Err(WorkerError { code, message, .. }) => {
                tracing::error!(job_id = %id, code = code.as_str(), error = %message, "Job failed");
                (
                    JobPatch::failed(message.clone(), Utc::now()),
                    ProcessOutcome::Failed { error: message },
                )
            }
        };

        match self.store.patch(id, &patch).await {
            Ok(()) => {
                if let ProcessOutcome::Completed { audio_url } = &outcome {
                    tracing::info!(job_id = %id, audio_url = %audio_url, "Job completed");
                }
            }
            Err(e) => {
                tracing::error!(
                    job_id = %id,
                    status = ?patch.status,
                    error = %e.message,
                    "Could not record terminal status"
                );
            }
        }
        outcome
    }
}
