//! Audio encoder seam used by the job processor.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::AudioFormat;

use super::transcode::Transcoder;
use super::wav::encode_wav;
use super::{EncodeError, Waveform};

/// Converts a raw waveform into deliverable bytes in the requested format.
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    async fn encode(&self, waveform: &Waveform, format: AudioFormat) -> Result<Vec<u8>>;
}

/// Encoder writing WAV in-process and MP3 through [`Transcoder`].
#[derive(Debug, Clone, Default)]
pub struct StandardEncoder {
    transcoder: Transcoder,
}

impl StandardEncoder {
    pub fn new(transcoder: Transcoder) -> Self {
        Self { transcoder }
    }

    pub fn transcoder(&self) -> &Transcoder {
        &self.transcoder
    }
}

fn check_layout(waveform: &Waveform) -> std::result::Result<(), EncodeError> {
    if waveform.is_empty() {
        return Err(EncodeError::EmptyWaveform);
    }
    if waveform.channels == 0 || waveform.sample_rate == 0 {
        return Err(EncodeError::InvalidLayout(format!(
            "{} channels at {} Hz",
            waveform.channels, waveform.sample_rate
        )));
    }
    if waveform.samples.len() % waveform.channels as usize != 0 {
        return Err(EncodeError::InvalidLayout(format!(
            "{} samples do not divide into {} channels",
            waveform.samples.len(),
            waveform.channels
        )));
    }
    Ok(())
}

#[async_trait]
impl AudioEncoder for StandardEncoder {
    async fn encode(&self, waveform: &Waveform, format: AudioFormat) -> Result<Vec<u8>> {
        check_layout(waveform)?;
        let bytes = match format {
            AudioFormat::Wav => encode_wav(waveform)?,
            AudioFormat::Mp3 => self.transcoder.wav_to_mp3(waveform).await?,
        };
        Ok(bytes)
    }
}
