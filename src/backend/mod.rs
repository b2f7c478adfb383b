//! Generation backend abstraction.
//!
//! A backend turns a prompt and per-call parameters into a raw waveform.
//! Backends may keep a model resident between calls, but duration, seed
//! and model are supplied on every call and never fixed at construction.

pub mod remote;

use async_trait::async_trait;

use crate::audio::Waveform;
use crate::error::Result;
use crate::types::GenerationParams;

pub use remote::{GenerateRequest, GenerateResponse, HealthResponse, RemoteBackend};

/// Parameters for a single generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub duration_sec: u32,
    pub seed: Option<i64>,
    pub model: String,
}

impl From<&GenerationParams> for GenerationRequest {
    fn from(params: &GenerationParams) -> Self {
        Self {
            prompt: params.prompt.clone(),
            duration_sec: params.duration_sec,
            seed: params.seed,
            model: params.model.clone(),
        }
    }
}

/// A subsystem that produces waveforms from prompts.
///
/// Given the same seed and loaded model state the output is deterministic;
/// without a seed it is not.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Identifier reported in logs (e.g. the endpoint URL or GPU type).
    fn id(&self) -> &str;

    /// Generates audio. May run for tens of seconds.
    async fn generate(&self, request: &GenerationRequest) -> Result<Waveform>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioFormat;

    #[test]
    fn request_from_params() {
        let params = GenerationParams {
            prompt: "ambient piano".to_string(),
            duration_sec: 15,
            seed: Some(42),
            format: AudioFormat::Mp3,
            model: "musicgen-medium".to_string(),
        };
        let request = GenerationRequest::from(&params);
        assert_eq!(request.prompt, "ambient piano");
        assert_eq!(request.duration_sec, 15);
        assert_eq!(request.seed, Some(42));
        assert_eq!(request.model, "musicgen-medium");
    }
}
