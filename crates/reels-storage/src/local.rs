use crate::traits::{validate_key, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Local filesystem storage, used for development and tests.
///
/// There is no signing here: the "upload URL" is the plain address under
/// `base_url` where a dev proxy is expected to accept the PUT.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// # Arguments
    /// * `base_path` - Root directory for objects (e.g. "/var/lib/reels/storage")
    /// * `base_url` - Base URL the objects are served under (e.g. "http://localhost:8000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn issue_upload_url(
        &self,
        key: &str,
        _content_type: &str,
        _ttl: Duration,
    ) -> StorageResult<String> {
        self.key_to_path(key)?;
        Ok(self.generate_url(key))
    }

    async fn object_exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn download(&self, key: &str, local_path: &Path) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        if !fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        fs::copy(&path, local_path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to copy {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    async fn upload(&self, local_path: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        self.ensure_parent_dir(&path).await?;

        let size = fs::copy(local_path, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            key = %key,
            content_type = %content_type,
            size_bytes = size,
            "Local upload successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
