//! Storage abstraction trait
//!
//! Every blob store backend implements [`Storage`]. The pipeline only needs
//! four capabilities: sign a direct upload, check that an object landed,
//! pull an object into a scratch file, and push a scratch file back.

use crate::StorageBackend;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Reject keys that could escape the bucket or local root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Time-limited URL that authorizes one direct PUT of `key`.
    ///
    /// Nothing guarantees the client ever uses it; callers must confirm the
    /// object with [`Storage::object_exists`] before relying on it.
    async fn issue_upload_url(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> StorageResult<String>;

    /// Whether an object is present at `key`.
    ///
    /// "Not found" is `Ok(false)`; only transport and auth failures are errors.
    async fn object_exists(&self, key: &str) -> StorageResult<bool>;

    /// Copy the object at `key` into `local_path`, replacing any existing file.
    async fn download(&self, key: &str, local_path: &Path) -> StorageResult<()>;

    /// Store the contents of `local_path` at `key` with the given content type.
    async fn upload(&self, local_path: &Path, key: &str, content_type: &str) -> StorageResult<()>;

    fn backend_type(&self) -> StorageBackend;
}
