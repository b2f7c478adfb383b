//! WAV encoding and decoding for generated audio.
//!
//! Writes waveforms as 32-bit float WAV using the hound crate, so encoding
//! is lossless. Decoding accepts both float and integer PCM, since remote
//! backends commonly return 16-bit WAV.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::{EncodeError, Waveform};

fn spec_for(waveform: &Waveform) -> WavSpec {
    WavSpec {
        channels: waveform.channels,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

/// Encodes a waveform into an in-memory WAV buffer.
///
/// # Example
///
/// ```ignore
/// use sonicforge_worker::audio::{encode_wav, Waveform};
///
/// let waveform = Waveform::mono(32000, vec![0.0, 0.5, -0.5, 0.0]);
/// let bytes = encode_wav(&waveform)?;
/// assert_eq!(&bytes[0..4], b"RIFF");
/// ```
pub fn encode_wav(waveform: &Waveform) -> Result<Vec<u8>, EncodeError> {
    let mut buffer = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec_for(waveform))?;
        for sample in &waveform.samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
    }
    Ok(buffer)
}

/// Decodes WAV bytes into a waveform.
///
/// Integer PCM is normalised into `[-1.0, 1.0)`.
pub fn decode_wav(bytes: &[u8]) -> Result<Waveform, EncodeError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(Waveform {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_round_trip_is_lossless() {
        let waveform = Waveform::mono(32000, vec![0.0, 0.5, -0.5, 0.123_456_79, -1.0, 1.0]);
        let bytes = encode_wav(&waveform).unwrap();
        let decoded = decode_wav(&bytes).unwrap();
        assert_eq!(decoded, waveform);
    }

    #[test]
    fn encode_wav_returns_riff_buffer() {
        let waveform = Waveform::mono(32000, vec![0.25]);
        let buffer = encode_wav(&waveform).unwrap();
        assert_eq!(&buffer[0..4], b"RIFF");
        assert_eq!(&buffer[8..12], b"WAVE");
    }

    #[test]
    fn native_sample_rate_and_layout_are_kept() {
        let waveform = Waveform {
            sample_rate: 44100,
            channels: 2,
            samples: vec![0.1, -0.1, 0.2, -0.2],
        };
        let decoded = decode_wav(&encode_wav(&waveform).unwrap()).unwrap();
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.frames(), 2);
    }

    #[test]
    fn decode_int16_pcm() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 32000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut buffer = Vec::new();
        {
            let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec).unwrap();
            writer.write_sample(0i16).unwrap();
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(-32768i16).unwrap();
            writer.finalize().unwrap();
        }

        let decoded = decode_wav(&buffer).unwrap();
        assert_eq!(decoded.samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_wav(b"not a wav file").is_err());
    }
}
