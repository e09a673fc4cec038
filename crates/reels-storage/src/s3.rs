use crate::traits::{validate_key, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
    Result as ObjectResult,
};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// S3 (or S3-compatible, e.g. MinIO) storage
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Build a client for `bucket`.
    ///
    /// Credentials come from the usual `AWS_*` environment variables.
    /// `endpoint_url` points at an S3-compatible provider such as
    /// `http://localhost:9000` for MinIO; plain-http endpoints are allowed.
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage { store, bucket })
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn issue_upload_url(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> StorageResult<String> {
        validate_key(key)?;
        let location = ObjectPath::from(key);
        let url_result: ObjectResult<_> = self.store.signed_url(Method::PUT, &location, ttl).await;

        let url = url_result
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string();

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            content_type = %content_type,
            ttl_secs = ttl.as_secs(),
            "Issued presigned upload URL"
        );

        Ok(url)
    }

    async fn object_exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let location = ObjectPath::from(key);
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => {
                tracing::error!(error = %e, bucket = %self.bucket, key = %key, "S3 head failed");
                Err(StorageError::BackendError(e.to_string()))
            }
        }
    }

    async fn download(&self, key: &str, local_path: &Path) -> StorageResult<()> {
        validate_key(key)?;
        let start = Instant::now();
        let location = ObjectPath::from(key);

        let result: ObjectResult<_> = self.store.get(&location).await;
        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let mut file = fs::File::create(local_path).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to create {}: {}",
                local_path.display(),
                e
            ))
        })?;

        let mut size: u64 = 0;
        let mut stream = result.into_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
            size += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(())
    }

    async fn upload(&self, local_path: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        let start = Instant::now();
        let data = fs::read(local_path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read {}: {}", local_path.display(), e))
        })?;
        let size = data.len() as u64;
        let location = ObjectPath::from(key);

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        let result: ObjectResult<_> = self
            .store
            .put_opts(&location, PutPayload::from(Bytes::from(data)), opts)
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            content_type = %content_type,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
