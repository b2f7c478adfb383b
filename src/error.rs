//! Error types for the sonicforge worker.
//!
//! Defines the error codes and the crate-wide error type used to report
//! failures from the job store, the work queue, the generation backend,
//! the audio encoder and artifact storage.

use std::fmt;

/// Error codes attached to every [`WorkerError`].
///
/// Codes are stable strings so they can be written into job records and
/// matched on in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Generation parameters are invalid.
    /// Trigger: empty or overlong prompt, duration outside 5-30s, unknown format.
    InvalidRequest,

    /// The job store could not be reached.
    /// Trigger: connection refused, DNS failure, timeout.
    JobStoreUnavailable,

    /// The job store answered with a non-2xx status.
    /// Trigger: unknown job id, rejected patch.
    JobStoreRejected,

    /// A job record could not be decoded.
    /// Trigger: malformed JSON or unknown status value.
    MalformedJob,

    /// The work queue could not be reached or returned an error.
    /// Trigger: Redis down, connection dropped mid-loop.
    QueueUnavailable,

    /// The generation backend failed.
    /// Trigger: backend exception, timeout, undecodable audio payload.
    GenerationFailed,

    /// Encoding the waveform into the requested format failed.
    /// Trigger: WAV write error, transcoder missing or exiting non-zero.
    EncodingFailed,

    /// Uploading the encoded artifact failed.
    /// Trigger: bucket unreachable, disk full.
    UploadFailed,

    /// Worker configuration is invalid.
    /// Trigger: empty URL, zero interval.
    InvalidConfig,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::JobStoreUnavailable => "JOB_STORE_UNAVAILABLE",
            ErrorCode::JobStoreRejected => "JOB_STORE_REJECTED",
            ErrorCode::MalformedJob => "MALFORMED_JOB",
            ErrorCode::QueueUnavailable => "QUEUE_UNAVAILABLE",
            ErrorCode::GenerationFailed => "GENERATION_FAILED",
            ErrorCode::EncodingFailed => "ENCODING_FAILED",
            ErrorCode::UploadFailed => "UPLOAD_FAILED",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "Generation parameters are invalid",
            ErrorCode::JobStoreUnavailable => "Job store could not be reached",
            ErrorCode::JobStoreRejected => "Job store rejected the request",
            ErrorCode::MalformedJob => "Job record could not be decoded",
            ErrorCode::QueueUnavailable => "Work queue could not be reached",
            ErrorCode::GenerationFailed => "Audio generation failed",
            ErrorCode::EncodingFailed => "Audio encoding failed",
            ErrorCode::UploadFailed => "Artifact upload failed",
            ErrorCode::InvalidConfig => "Worker configuration is invalid",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => {
                "Provide a prompt of 1-400 characters, a duration between 5 and 30 seconds \
                 and a format of 'wav' or 'mp3'"
            }
            ErrorCode::JobStoreUnavailable => {
                "Check that the job tracking API is running and API_URL points at it"
            }
            ErrorCode::JobStoreRejected => {
                "Verify the job id exists and the job tracking API accepts the update"
            }
            ErrorCode::MalformedJob => {
                "Inspect the job record returned by the job tracking API for missing or invalid fields"
            }
            ErrorCode::QueueUnavailable => {
                "Check that Redis is running and REDIS_URL is correct; the worker retries automatically"
            }
            ErrorCode::GenerationFailed => {
                "Check the generation endpoint at GENERATION_URL, its GPU allocation and logs, \
                 or retry with a shorter duration"
            }
            ErrorCode::EncodingFailed => {
                "Make sure ffmpeg is installed with libmp3lame (or set FFMPEG_PATH), \
                 or request 'wav' output"
            }
            ErrorCode::UploadFailed => {
                "Check storage credentials, the S3_BUCKET name, or free space in STORAGE_DIR"
            }
            ErrorCode::InvalidConfig => "Fix the offending environment variable or CLI flag",
        }
    }

    /// Returns true for infrastructure errors that are retried after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::JobStoreUnavailable | ErrorCode::QueueUnavailable
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for worker operations.
#[derive(Debug)]
pub struct WorkerError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl WorkerError {
    /// Creates a new WorkerError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new WorkerError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an INVALID_REQUEST error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, reason)
    }

    /// Creates an INVALID_REQUEST error for an out-of-range duration.
    pub fn invalid_duration(duration_sec: u32) -> Self {
        Self::new(
            ErrorCode::InvalidRequest,
            format!(
                "Invalid duration: {} seconds (must be between 5 and 30)",
                duration_sec
            ),
        )
    }

    /// Creates an INVALID_REQUEST error for empty prompts.
    pub fn empty_prompt() -> Self {
        Self::new(ErrorCode::InvalidRequest, "Prompt cannot be empty")
    }

    /// Creates an INVALID_REQUEST error for prompts that are too long.
    pub fn prompt_too_long(len: usize) -> Self {
        Self::new(
            ErrorCode::InvalidRequest,
            format!("Prompt too long: {} characters (maximum 400)", len),
        )
    }

    /// Creates an INVALID_REQUEST error for an unknown output format.
    pub fn unsupported_format(format: &str) -> Self {
        Self::new(
            ErrorCode::InvalidRequest,
            format!("Unsupported format '{}' (must be 'wav' or 'mp3')", format),
        )
    }

    /// Creates a JOB_STORE_UNAVAILABLE error.
    pub fn job_store_unavailable(source: reqwest::Error) -> Self {
        Self::with_source(
            ErrorCode::JobStoreUnavailable,
            format!("Job store request failed: {}", source),
            source,
        )
    }

    /// Creates a JOB_STORE_REJECTED error.
    pub fn job_store_rejected(status: u16, body: &str) -> Self {
        Self::new(
            ErrorCode::JobStoreRejected,
            format!("Job store returned HTTP {}: {}", status, excerpt(body, 200)),
        )
    }

    /// Creates a MALFORMED_JOB error.
    pub fn malformed_job(source: serde_json::Error) -> Self {
        Self::with_source(
            ErrorCode::MalformedJob,
            format!("Malformed job record: {}", source),
            source,
        )
    }

    /// Creates a QUEUE_UNAVAILABLE error.
    pub fn queue_unavailable(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::QueueUnavailable, reason)
    }

    /// Creates a GENERATION_FAILED error.
    pub fn generation_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GenerationFailed,
            format!("Generation failed: {}", reason.into()),
        )
    }

    /// Creates an UPLOAD_FAILED error.
    pub fn upload_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UploadFailed,
            format!("Upload failed: {}", reason.into()),
        )
    }

    /// Creates an INVALID_CONFIG error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, reason)
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using WorkerError.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Truncates `text` to at most `max_chars` characters.
///
/// Cuts on a character boundary so multi-byte diagnostics never split.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_as_str() {
        assert_eq!(ErrorCode::InvalidRequest.as_str(), "INVALID_REQUEST");
        assert_eq!(ErrorCode::JobStoreUnavailable.as_str(), "JOB_STORE_UNAVAILABLE");
        assert_eq!(ErrorCode::JobStoreRejected.as_str(), "JOB_STORE_REJECTED");
        assert_eq!(ErrorCode::MalformedJob.as_str(), "MALFORMED_JOB");
        assert_eq!(ErrorCode::QueueUnavailable.as_str(), "QUEUE_UNAVAILABLE");
        assert_eq!(ErrorCode::GenerationFailed.as_str(), "GENERATION_FAILED");
        assert_eq!(ErrorCode::EncodingFailed.as_str(), "ENCODING_FAILED");
        assert_eq!(ErrorCode::UploadFailed.as_str(), "UPLOAD_FAILED");
        assert_eq!(ErrorCode::InvalidConfig.as_str(), "INVALID_CONFIG");
    }

    #[test]
    fn only_infrastructure_errors_are_transient() {
        assert!(ErrorCode::JobStoreUnavailable.is_transient());
        assert!(ErrorCode::QueueUnavailable.is_transient());
        assert!(!ErrorCode::GenerationFailed.is_transient());
        assert!(!ErrorCode::MalformedJob.is_transient());
        assert!(!ErrorCode::InvalidRequest.is_transient());
    }

    #[test]
    fn worker_error_display() {
        let err = WorkerError::invalid_duration(45);
        assert!(err.to_string().contains("INVALID_REQUEST"));
        assert!(err.to_string().contains("45"));
        assert!(err.to_string().contains("Recovery:"));
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        assert_eq!(excerpt("abcdef", 3), "abc");
        assert_eq!(excerpt("abc", 10), "abc");
        assert_eq!(excerpt("ééé", 2), "éé");
    }

    #[test]
    fn rejected_body_is_bounded() {
        let body = "x".repeat(1000);
        let err = WorkerError::job_store_rejected(500, &body);
        assert!(err.message.len() < 300);
        assert!(err.message.contains("HTTP 500"));
    }
}
