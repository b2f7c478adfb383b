//! HTTP client for a remote generation endpoint.
//!
//! Speaks the `POST /generate` / `GET /health` contract of the GPU-hosted
//! generation service. The worker always requests `wav` so the returned
//! audio can be decoded back into a waveform and encoded locally in the
//! job's own format.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::audio::{decode_wav, Waveform};
use crate::error::{excerpt, ErrorCode, Result, WorkerError};
use crate::types::{validate_duration, validate_prompt, AudioFormat};

use super::{GenerationBackend, GenerationRequest};

/// Body of `POST /generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub duration_sec: u32,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default)]
    pub format: AudioFormat,
    /// Not part of the minimal contract; endpoints that serve one model ignore it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GenerateRequest {
    /// Applies the endpoint's 400 rules (prompt 1-400 chars, duration 5-30).
    ///
    /// Unknown formats already fail to deserialize into [`AudioFormat`].
    pub fn validate(&self) -> Result<()> {
        validate_prompt(&self.prompt)?;
        validate_duration(self.duration_sec)
    }
}

/// Body returned by `POST /generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub format: AudioFormat,
    pub audio_base64: String,
    pub duration_sec: u32,
    #[serde(default)]
    pub seed: Option<i64>,
}

impl GenerateResponse {
    /// Decodes the base64 audio payload.
    pub fn audio_bytes(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.audio_base64.as_bytes())
            .map_err(|e| {
                WorkerError::with_source(
                    ErrorCode::GenerationFailed,
                    format!("Invalid base64 audio payload: {}", e),
                    e,
                )
            })
    }
}

/// Body returned by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub gpu: Option<String>,
}

/// Generation backend reached over HTTP.
pub struct RemoteBackend {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteBackend {
    /// Creates a client for the endpoint at `base_url`.
    ///
    /// `timeout` bounds a whole generation call, which can take tens of seconds.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                WorkerError::with_source(
                    ErrorCode::InvalidConfig,
                    format!("Failed to create HTTP client: {}", e),
                    e,
                )
            })?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a backend reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Calls `GET /health`.
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(request_failed)?;

        let response = ensure_success(response).await?;
        response.json::<HealthResponse>().await.map_err(request_failed)
    }

    /// Sends a validated request and returns the raw response body.
    pub async fn generate_raw(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        request.validate()?;

        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(request_failed)?;

        let response = ensure_success(response).await?;
        response
            .json::<GenerateResponse>()
            .await
            .map_err(request_failed)
    }
}

#[async_trait]
impl GenerationBackend for RemoteBackend {
    fn id(&self) -> &str {
        &self.base_url
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Waveform> {
        let body = GenerateRequest {
            prompt: request.prompt.clone(),
            duration_sec: request.duration_sec,
            seed: request.seed,
            format: AudioFormat::Wav,
            model: Some(request.model.clone()),
        };

        let response = self.generate_raw(&body).await?;
        if response.format != AudioFormat::Wav {
            return Err(WorkerError::generation_failed(format!(
                "endpoint returned '{}' audio, expected wav",
                response.format
            )));
        }

        let bytes = response.audio_bytes()?;
        decode_wav(&bytes).map_err(|e| {
            WorkerError::with_source(
                ErrorCode::GenerationFailed,
                format!("Undecodable audio from endpoint: {}", e),
                e,
            )
        })
    }
}

fn request_failed(err: reqwest::Error) -> WorkerError {
    WorkerError::with_source(
        ErrorCode::GenerationFailed,
        format!("Generation endpoint request failed: {}", err),
        err,
    )
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let code = if status == reqwest::StatusCode::BAD_REQUEST {
        ErrorCode::InvalidRequest
    } else {
        ErrorCode::GenerationFailed
    };
    Err(WorkerError::new(
        code,
        format!(
            "Generation endpoint returned HTTP {}: {}",
            status.as_u16(),
            excerpt(&body, 200)
        ),
    ))
}
