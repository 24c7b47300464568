//! S3-compatible object store (requires the `s3` feature).
//!
//! Works against AWS S3 and S3-compatible services such as MinIO. When no
//! access key is configured, credentials come from the default AWS provider
//! chain (environment, profile, instance metadata).

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream as S3Body;
use futures::TryStreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use netdrive_core::config::S3StorageConfig;
use netdrive_core::error::{AppError, ErrorKind};
use netdrive_core::result::AppResult;
use netdrive_core::traits::storage::{
    ByteStream, ObjectMeta, ObjectPage, ObjectStore, PresignedUrls,
};

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// S3-compatible object store.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    page_size: i32,
}

impl S3ObjectStore {
    /// Build a client from configuration.
    pub async fn new(config: &S3StorageConfig, page_size: usize) -> AppResult<Self> {
        if config.bucket.is_empty() {
            return Err(AppError::configuration("storage.s3.bucket must be set"));
        }
        info!(
            endpoint = %config.endpoint,
            region = %config.region,
            bucket = %config.bucket,
            "Initializing S3 object store"
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if !config.access_key.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "netdrive-config",
            ));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared)
            // Path-style addressing for MinIO and other S3-compatible services.
            .force_path_style(true);
        if !config.endpoint.is_empty() {
            builder = builder.endpoint_url(config.endpoint.clone());
        }

        let store = Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            page_size: i32::try_from(page_size.clamp(1, 1000)).unwrap_or(1000),
        };

        if config.create_bucket {
            store.ensure_bucket().await?;
        }
        Ok(store)
    }

    /// Create the bucket when it does not exist yet.
    async fn ensure_bucket(&self) -> AppResult<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create bucket {}", self.bucket),
                    e.into_service_error(),
                )
            })?;
        info!(bucket = %self.bucket, "Created bucket");
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn provider_type(&self) -> &str {
        "s3"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok())
    }

    async fn open(&self, key: &str) -> AppResult<ByteStream> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                err if err.is_no_such_key() => {
                    AppError::not_found(format!("Object not found: {key}"))
                }
                err => AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to open object: {key}"),
                    err,
                ),
            })?;

        let reader = output.body.into_async_read();
        Ok(Box::pin(ReaderStream::with_capacity(reader, READ_CHUNK_BYTES)))
    }

    async fn put(&self, key: &str, stream: ByteStream) -> AppResult<u64> {
        // PutObject needs a known length, so the upload is collected first.
        let chunks: Vec<bytes::Bytes> = stream.try_collect().await?;
        let data = chunks.concat();
        let len = data.len() as u64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(S3Body::from(data))
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to put object: {key}"),
                    e.into_service_error(),
                )
            })?;

        debug!(key, bytes = len, "Stored object");
        Ok(len)
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        // DeleteObject succeeds for missing keys.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to delete object: {key}"),
                    e.into_service_error(),
                )
            })?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(err)) if err.err().is_not_found() => Ok(false),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to stat object: {key}"),
                e.into_service_error(),
            )),
        }
    }

    async fn list_page(&self, prefix: &str, token: Option<String>) -> AppResult<ObjectPage> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(self.page_size);
        if let Some(token) = token {
            request = request.continuation_token(token);
        }

        let response = request.send().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to list objects under '{prefix}'"),
                e.into_service_error(),
            )
        })?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                Some(ObjectMeta {
                    key,
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified: obj
                        .last_modified()
                        .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
                })
            })
            .collect();

        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_token,
        })
    }

    fn presigner(&self) -> Option<&dyn PresignedUrls> {
        Some(self)
    }
}

#[async_trait]
impl PresignedUrls for S3ObjectStore {
    async fn presigned_get(&self, key: &str, expires_in: Duration) -> AppResult<String> {
        let presign = PresigningConfig::expires_in(expires_in).map_err(|e| {
            AppError::with_source(ErrorKind::Validation, "Invalid presign expiry", e)
        })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to presign download of {key}"),
                    e.into_service_error(),
                )
            })?;

        Ok(request.uri().to_string())
    }
}
