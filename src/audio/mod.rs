//! Audio encoding module.
//!
//! Turns raw waveforms produced by a generation backend into deliverable
//! bytes: WAV written directly, MP3 via an external ffmpeg transcode.

pub mod encoder;
pub mod transcode;
pub mod wav;

use crate::error::{ErrorCode, WorkerError};

pub use encoder::{AudioEncoder, StandardEncoder};
pub use transcode::{Transcoder, STDERR_EXCERPT_CHARS};
pub use wav::{decode_wav, encode_wav};

/// Sample rate reported by the MusicGen backend (32kHz).
pub const MUSICGEN_SAMPLE_RATE: u32 = 32000;

/// Raw audio produced by a generation backend.
///
/// Samples are interleaved when `channels > 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl Waveform {
    /// Creates a single-channel waveform.
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels: 1,
            samples,
        }
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Duration of the waveform in seconds.
    pub fn duration_sec(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f32 / self.sample_rate as f32
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Errors raised while encoding audio.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("waveform has no samples")]
    EmptyWaveform,

    #[error("invalid waveform layout: {0}")]
    InvalidLayout(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcoder '{program}' could not be started: {source}")]
    TranscoderNotFound {
        program: String,
        source: std::io::Error,
    },

    /// `stderr` holds at most [`STDERR_EXCERPT_CHARS`] characters.
    #[error("ffmpeg mp3 encode failed (exit code {exit_code:?}): {stderr}")]
    TranscoderFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl From<EncodeError> for WorkerError {
    fn from(err: EncodeError) -> Self {
        WorkerError::with_source(ErrorCode::EncodingFailed, err.to_string(), err)
    }
}
