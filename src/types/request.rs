//! Generation parameters and their validation.
//!
//! Parameters are validated before any generation work is paid for: an
//! unsupported format or out-of-range duration never reaches the backend.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkerError};

use super::job::Job;

/// Minimum accepted duration in seconds.
pub const MIN_DURATION_SEC: u32 = 5;

/// Maximum accepted duration in seconds.
pub const MAX_DURATION_SEC: u32 = 30;

/// Duration used when a job does not specify one.
pub const DEFAULT_DURATION_SEC: u32 = 15;

/// Maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 400;

/// Deliverable audio format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Lossless WAV at the backend's native sample rate.
    Wav,
    /// MP3 transcoded from an intermediate WAV.
    #[default]
    Mp3,
}

impl AudioFormat {
    /// Returns the wire representation of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }

    /// Parses a format from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "wav" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            _ => None,
        }
    }

    /// File extension for artifacts in this format.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// MIME type used when uploading artifacts.
    pub fn content_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validated parameters for one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    pub prompt: String,
    pub duration_sec: u32,
    pub seed: Option<i64>,
    pub format: AudioFormat,
    pub model: String,
}

impl GenerationParams {
    /// Extracts and validates generation parameters from a job record.
    ///
    /// Missing fields fall back to [`DEFAULT_DURATION_SEC`], [`AudioFormat::Mp3`]
    /// and `default_model`.
    pub fn from_job(job: &Job, default_model: &str) -> Result<Self> {
        let format = match job.format.as_deref() {
            None => AudioFormat::default(),
            Some(raw) => {
                AudioFormat::parse(raw).ok_or_else(|| WorkerError::unsupported_format(raw))?
            }
        };

        let model = job
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(default_model)
            .to_string();

        let params = Self {
            prompt: job.prompt.clone(),
            duration_sec: job.duration_sec.unwrap_or(DEFAULT_DURATION_SEC),
            seed: job.seed,
            format,
            model,
        };
        params.validate()?;
        Ok(params)
    }

    /// Validates prompt and duration bounds.
    pub fn validate(&self) -> Result<()> {
        validate_prompt(&self.prompt)?;
        validate_duration(self.duration_sec)
    }
}

/// Checks that a prompt is non-empty and at most [`MAX_PROMPT_CHARS`] characters.
pub fn validate_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(WorkerError::empty_prompt());
    }
    let len = prompt.chars().count();
    if len > MAX_PROMPT_CHARS {
        return Err(WorkerError::prompt_too_long(len));
    }
    Ok(())
}

/// Checks that a duration lies within `MIN_DURATION_SEC..=MAX_DURATION_SEC`.
pub fn validate_duration(duration_sec: u32) -> Result<()> {
    if (MIN_DURATION_SEC..=MAX_DURATION_SEC).contains(&duration_sec) {
        Ok(())
    } else {
        Err(WorkerError::invalid_duration(duration_sec))
    }
}
