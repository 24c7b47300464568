//! Object store trait for pluggable blob storage backends.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};

use crate::error::AppError;
use crate::result::AppResult;

/// Metadata about a stored object, as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ObjectMeta {
    /// Full key of the object.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modified timestamp (if the backend reports one).
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    /// Objects on this page, in backend order.
    pub objects: Vec<ObjectMeta>,
    /// Continuation token for the next page; `None` on the last page.
    pub next_token: Option<String>,
}

/// A byte stream type used for reading and writing object contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// A lazy stream of listed objects spanning every page of a listing.
pub type ObjectStream<'a> = Pin<Box<dyn Stream<Item = AppResult<ObjectMeta>> + Send + 'a>>;

/// Capability to issue time-limited direct download URLs.
#[async_trait]
pub trait PresignedUrls: Send + Sync {
    /// Produce a URL that downloads `key` without further authentication
    /// until `expires_in` has elapsed.
    async fn presigned_get(&self, key: &str, expires_in: Duration) -> AppResult<String>;
}

/// Path-addressed blob storage.
///
/// Implementations exist for the local filesystem, S3-compatible services,
/// and (behind the `mock` feature of `netdrive-storage`) an in-memory map.
/// The trait is defined here in `netdrive-core` and implemented in
/// `netdrive-storage`.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local", "s3").
    fn provider_type(&self) -> &str;

    /// Check whether the backend is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Open an object for reading as a chunk stream.
    ///
    /// Fails with [`ErrorKind::NotFound`](crate::error::ErrorKind::NotFound)
    /// when the key does not exist.
    async fn open(&self, key: &str) -> AppResult<ByteStream>;

    /// Write a byte stream to `key`, replacing any existing object.
    /// Returns the number of bytes written.
    async fn put(&self, key: &str, stream: ByteStream) -> AppResult<u64>;

    /// Delete the object at `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Check whether an object exists at `key`.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Fetch one page of objects whose keys start with `prefix`.
    async fn list_page(&self, prefix: &str, token: Option<String>) -> AppResult<ObjectPage>;

    /// The presigned URL capability, when this backend has one.
    fn presigner(&self) -> Option<&dyn PresignedUrls> {
        None
    }

    /// Lazily list every object under `prefix`, draining all pages.
    fn list_by_prefix<'a>(&'a self, prefix: &'a str) -> ObjectStream<'a> {
        let pages = futures::stream::try_unfold(Some(None), move |state| async move {
            let Some(token) = state else {
                return Ok::<_, AppError>(None);
            };
            let page = self.list_page(prefix, token).await?;
            let next = page.next_token.map(Some);
            Ok(Some((page.objects, next)))
        });

        Box::pin(
            pages
                .map_ok(|objects| futures::stream::iter(objects.into_iter().map(Ok::<_, AppError>)))
                .try_flatten(),
        )
    }

    /// Create a zero-length directory marker object at `prefix/`.
    async fn create_marker(&self, prefix: &str) -> AppResult<()> {
        let key = format!("{}/", prefix.trim_end_matches('/'));
        self.put(&key, Box::pin(futures::stream::empty())).await?;
        Ok(())
    }
}
