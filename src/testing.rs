//! In-memory fakes for the injected clients, shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::audio::{AudioEncoder, Waveform, MUSICGEN_SAMPLE_RATE};
use crate::backend::{GenerationBackend, GenerationRequest};
use crate::error::{ErrorCode, Result, WorkerError};
use crate::queue::WorkQueue;
use crate::storage::ArtifactStore;
use crate::store::JobStore;
use crate::types::{AudioFormat, Job, JobId, JobPatch, JobStatus};

/// A job record with the given id and status and sensible parameters.
pub fn job(id: &str, status: JobStatus) -> Job {
    Job {
        id: JobId::from(id),
        status,
        prompt: "ambient piano".to_string(),
        model: Some("musicgen-medium".to_string()),
        duration_sec: Some(15),
        seed: Some(42),
        format: Some("mp3".to_string()),
        audio_url: None,
        error: None,
        created_at: None,
        started_at: None,
        finished_at: None,
    }
}

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<Job>>,
    patches: Mutex<Vec<(JobId, JobPatch)>>,
    fetches: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_list_times: AtomicUsize,
    fail_patch_status: Mutex<Option<JobStatus>>,
}

impl MemoryJobStore {
    pub fn with_jobs(jobs: Vec<Job>) -> Self {
        Self {
            jobs: Mutex::new(jobs),
            ..Default::default()
        }
    }

    pub fn failing_fetch(self) -> Self {
        self.fail_fetch.store(true, Ordering::SeqCst);
        self
    }

    /// Makes the next `times` list calls fail as if the store were down.
    pub fn failing_list(self, times: usize) -> Self {
        self.fail_list_times.store(times, Ordering::SeqCst);
        self
    }

    /// Rejects patches that set `status`.
    pub fn rejecting_patch(self, status: JobStatus) -> Self {
        *self.fail_patch_status.lock().unwrap() = Some(status);
        self
    }

    pub fn patches(&self) -> Vec<(JobId, JobPatch)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn patches_for(&self, id: &str) -> Vec<JobPatch> {
        self.patches()
            .into_iter()
            .filter(|(pid, _)| pid.as_str() == id)
            .map(|(_, p)| p)
            .collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn status_of(&self, id: &str) -> Option<JobStatus> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id.as_str() == id)
            .map(|j| j.status)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn fetch(&self, id: &JobId) -> Result<Job> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(WorkerError::new(
                ErrorCode::JobStoreUnavailable,
                "job store unreachable",
            ));
        }
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| &j.id == id)
            .cloned()
            .ok_or_else(|| WorkerError::job_store_rejected(404, "Job not found"))
    }

    async fn list(&self) -> Result<Vec<Job>> {
        let remaining = self.fail_list_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_list_times.store(remaining - 1, Ordering::SeqCst);
            return Err(WorkerError::new(
                ErrorCode::JobStoreUnavailable,
                "job store unreachable",
            ));
        }
        Ok(self.jobs.lock().unwrap().clone())
    }

    async fn patch(&self, id: &JobId, patch: &JobPatch) -> Result<()> {
        if patch.status.is_some() && *self.fail_patch_status.lock().unwrap() == patch.status {
            return Err(WorkerError::job_store_rejected(500, "patch rejected"));
        }
        self.patches.lock().unwrap().push((id.clone(), patch.clone()));

        let mut jobs = self.jobs.lock().unwrap();
        for job in jobs.iter_mut().filter(|j| &j.id == id) {
            if let Some(status) = patch.status {
                job.status = status;
            }
            if patch.started_at.is_some() {
                job.started_at = patch.started_at.clone();
            }
            if patch.finished_at.is_some() {
                job.finished_at = patch.finished_at.clone();
            }
            if patch.audio_url.is_some() {
                job.audio_url = patch.audio_url.clone();
            }
            if patch.error.is_some() {
                job.error = patch.error.clone();
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<String>>,
    failing: bool,
}

impl MemoryQueue {
    pub fn with_items(items: &[&str]) -> Self {
        Self {
            items: Mutex::new(items.iter().map(|s| s.to_string()).collect()),
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            items: Mutex::default(),
            failing: true,
        }
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn pop(&self, timeout: Duration) -> Result<Option<String>> {
        if self.failing {
            return Err(WorkerError::queue_unavailable("connection reset by peer"));
        }
        let item = self.items.lock().unwrap().pop_front();
        if item.is_none() {
            tokio::time::sleep(timeout).await;
        }
        Ok(item)
    }

    async fn push(&self, item: &str) -> Result<()> {
        if self.failing {
            return Err(WorkerError::queue_unavailable("connection reset by peer"));
        }
        self.items.lock().unwrap().push_back(item.to_string());
        Ok(())
    }
}

pub struct FakeBackend {
    calls: Mutex<Vec<GenerationRequest>>,
    failure: Option<String>,
    delay: Duration,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            calls: Mutex::default(),
            failure: None,
            delay: Duration::from_millis(2),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    fn id(&self) -> &str {
        "fake"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Waveform> {
        self.calls.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.delay).await;
        match &self.failure {
            Some(reason) => Err(WorkerError::generation_failed(reason.clone())),
            None => Ok(Waveform::mono(
                MUSICGEN_SAMPLE_RATE,
                vec![0.0, 0.5, -0.5, 0.0],
            )),
        }
    }
}

#[derive(Default)]
pub struct FakeEncoder {
    calls: Mutex<Vec<AudioFormat>>,
    fail: bool,
}

impl FakeEncoder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<AudioFormat> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioEncoder for FakeEncoder {
    async fn encode(&self, _waveform: &Waveform, format: AudioFormat) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(format);
        if self.fail {
            return Err(WorkerError::new(
                ErrorCode::EncodingFailed,
                "ffmpeg mp3 encode failed (exit code Some(1)): Unknown encoder 'libmp3lame'",
            ));
        }
        Ok(vec![0xFF; 16])
    }
}

#[derive(Default)]
pub struct FakeStorage {
    uploads: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl FakeStorage {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Uploaded `(key, content_type)` pairs.
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for FakeStorage {
    async fn upload(&self, key: &str, _bytes: Vec<u8>, content_type: &str) -> Result<String> {
        if self.fail {
            return Err(WorkerError::upload_failed("bucket unreachable"));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((key.to_string(), content_type.to_string()));
        Ok(format!("https://cdn.test/{}", key))
    }
}
