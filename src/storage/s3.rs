//! S3 artifact storage.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{Result, WorkerError};

use super::{public_url, ArtifactStore};

/// Uploads artifacts to an S3 bucket.
///
/// Credentials and region come from the standard AWS environment
/// (`AWS_ACCESS_KEY_ID`, `AWS_REGION`, profiles, instance metadata).
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: Option<String>,
}

impl S3Storage {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_base_url: None,
        }
    }

    /// Builds a client from the ambient AWS configuration.
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket)
    }

    pub fn with_public_base_url(mut self, base: impl Into<String>) -> Self {
        self.public_base_url = Some(base.into());
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// URL recorded on the job for `key`.
    pub fn object_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => public_url(base, key),
            None => format!("https://{}.s3.amazonaws.com/{}", self.bucket, key),
        }
    }
}

#[async_trait]
impl ArtifactStore for S3Storage {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                WorkerError::upload_failed(format!(
                    "s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        tracing::debug!(bucket = %self.bucket, key, bytes = size, "Uploaded artifact to S3");
        Ok(self.object_url(key))
    }
}
