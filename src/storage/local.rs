//! Filesystem artifact storage for local operation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{ErrorCode, Result, WorkerError};

use super::{public_url, ArtifactStore};

/// Writes artifacts under a root directory.
///
/// URLs are `file://` paths unless a public base URL (e.g. a static file
/// server in front of the directory) is configured.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_base_url: None,
        }
    }

    pub fn with_public_base_url(mut self, base: impl Into<String>) -> Self {
        self.public_base_url = Some(base.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(WorkerError::upload_failed(format!("invalid artifact key '{}'", key)));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ArtifactStore for LocalStorage {
    async fn upload(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let path = self.resolve(key)?;
        let io_failed = |e: std::io::Error| {
            WorkerError::with_source(
                ErrorCode::UploadFailed,
                format!("Failed to write {}: {}", path.display(), e),
                e,
            )
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_failed)?;
        }
        tokio::fs::write(&path, &bytes).await.map_err(io_failed)?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Stored artifact");

        Ok(match &self.public_base_url {
            Some(base) => public_url(base, key),
            None => format!("file://{}", path.display()),
        })
    }
}
