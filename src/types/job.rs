//! Job record types exchanged with the job tracking API.
//!
//! A [`Job`] is the worker's transient view of a record owned by the job
//! store. The worker never mutates it locally; every state change is sent
//! to the store as a [`JobPatch`] carrying only the changed fields.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque job identifier assigned by the job store.
///
/// The store emits numeric ids while the work queue carries plain text, so
/// both representations decode to the same identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    /// Creates a JobId from a raw queue item, trimming surrounding whitespace.
    ///
    /// Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for JobId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(Self(n.to_string())),
            Raw::Text(s) => JobId::parse(&s)
                .ok_or_else(|| serde::de::Error::custom("job id cannot be empty")),
        }
    }
}

/// Lifecycle status of a job.
///
/// Transitions are forward-only: `pending → processing → completed|failed`,
/// with `pending → failed` allowed for jobs rejected before generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created by the job store, waiting for a worker.
    #[default]
    Pending,
    /// Claimed by a worker; generation may be running.
    Processing,
    /// Audio generated and uploaded; `audioUrl` is set.
    Completed,
    /// Processing failed; `error` may carry a summary.
    Failed,
}

impl JobStatus {
    /// Returns the wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Returns true if moving from `self` to `next` is a forward transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A job record as returned by `GET /api/jobs/{id}`.
///
/// Fields the worker does not use (presets, quality params, ...) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Store-assigned identifier.
    pub id: JobId,

    /// Current status.
    pub status: JobStatus,

    /// Text description of the desired music.
    pub prompt: String,

    /// Model or preset identifier; the worker default applies when absent.
    #[serde(default)]
    pub model: Option<String>,

    /// Requested duration in seconds.
    #[serde(default)]
    pub duration_sec: Option<u32>,

    /// Seed for reproducible generation.
    #[serde(default)]
    pub seed: Option<i64>,

    /// Requested output format (`wav` or `mp3`), validated before generation.
    #[serde(default)]
    pub format: Option<String>,

    /// Artifact URL, present once completed.
    #[serde(default)]
    pub audio_url: Option<String>,

    /// Error summary, present once failed.
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub started_at: Option<String>,

    #[serde(default)]
    pub finished_at: Option<String>,
}

/// Changed fields sent with `PATCH /api/jobs/{id}`.
///
/// Unset fields are omitted from the body entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobPatch {
    /// Patch recording the `pending → processing` transition.
    pub fn processing(started_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            started_at: Some(format_timestamp(started_at)),
            ..Default::default()
        }
    }

    /// Patch recording successful completion.
    pub fn completed(audio_url: impl Into<String>, finished_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            finished_at: Some(format_timestamp(finished_at)),
            audio_url: Some(audio_url.into()),
            ..Default::default()
        }
    }

    /// Patch recording failure with an error summary.
    pub fn failed(error: impl Into<String>, finished_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            finished_at: Some(format_timestamp(finished_at)),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Returns true if this patch moves the job into a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.map(|s| s.is_terminal()).unwrap_or(false)
    }
}

/// Formats a UTC instant as ISO-8601 with microsecond precision and a trailing `Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
