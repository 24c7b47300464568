//! In-memory object store for tests.
//!
//! Objects live in a `BTreeMap` behind a [`RwLock`], so listings come out in
//! key order and every trait method works on `&self`. Failures and latency
//! can be injected per key to exercise partial-failure and cancellation
//! paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use tokio::sync::RwLock;

use netdrive_core::error::AppError;
use netdrive_core::result::AppResult;
use netdrive_core::traits::storage::{
    ByteStream, ObjectMeta, ObjectPage, ObjectStore, PresignedUrls,
};

/// In-memory [`ObjectStore`].
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
    page_size: usize,
    chunk_size: usize,
    failing_deletes: RwLock<HashSet<String>>,
    delete_delay: Option<Duration>,
    open_delay: Option<Duration>,
    failing_list_after: Option<usize>,
    presign_base: Option<String>,
    delete_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: 1000,
            chunk_size: 64 * 1024,
            failing_deletes: RwLock::new(HashSet::new()),
            delete_delay: None,
            open_delay: None,
            failing_list_after: None,
            presign_base: None,
            delete_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Create a store pre-populated with objects.
    pub fn with_objects(
        objects: impl IntoIterator<Item = (impl Into<String>, impl Into<Bytes>)>,
    ) -> Self {
        let store = Self::new();
        let map = objects
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            objects: RwLock::new(map),
            ..store
        }
    }

    /// Limit how many keys each listing page returns.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Split opened objects into chunks of this many bytes.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Sleep this long inside every delete call.
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    /// Sleep this long before every open returns.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Serve this many listing pages, then fail every later one.
    pub fn with_failing_list_after(mut self, pages: usize) -> Self {
        self.failing_list_after = Some(pages);
        self
    }

    /// Enable the presign capability, issuing URLs under `base`.
    pub fn with_presign_base(mut self, base: impl Into<String>) -> Self {
        self.presign_base = Some(base.into());
        self
    }

    /// Make deletes of these keys fail with a storage error.
    pub async fn fail_deletes_for(&self, keys: impl IntoIterator<Item = impl Into<String>>) {
        let mut failing = self.failing_deletes.write().await;
        failing.extend(keys.into_iter().map(Into::into));
    }

    /// Insert an object directly.
    pub async fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects.write().await.insert(key.into(), data.into());
    }

    /// Snapshot of every key currently stored.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Number of objects currently stored.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// How many delete calls have been made, including failed ones.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn open(&self, key: &str) -> AppResult<ByteStream> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        let data = self
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Object not found: {key}")))?;

        let chunk_size = self.chunk_size;
        let chunks: Vec<Result<Bytes, std::io::Error>> = (0..data.len())
            .step_by(chunk_size)
            .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn put(&self, key: &str, stream: ByteStream) -> AppResult<u64> {
        let chunks: Vec<Bytes> = stream.try_collect().await?;
        let data = Bytes::from(chunks.concat());
        let len = data.len() as u64;
        self.objects.write().await.insert(key.to_string(), data);
        Ok(len)
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_deletes.read().await.contains(key) {
            return Err(AppError::storage(format!("injected delete failure for {key}")));
        }
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn list_page(&self, prefix: &str, token: Option<String>) -> AppResult<ObjectPage> {
        let served = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_list_after.is_some_and(|pages| served >= pages) {
            return Err(AppError::storage(format!("injected listing failure for {prefix}")));
        }
        let objects = self.objects.read().await;
        let mut remaining = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| token.as_deref().is_none_or(|t| key.as_str() > t))
            .map(|(key, data)| ObjectMeta {
                key: key.clone(),
                size: data.len() as u64,
                last_modified: None,
            });

        let page: Vec<ObjectMeta> = remaining.by_ref().take(self.page_size).collect();
        let next_token = match (remaining.next(), page.last()) {
            (Some(_), Some(last)) => Some(last.key.clone()),
            _ => None,
        };

        Ok(ObjectPage {
            objects: page,
            next_token,
        })
    }

    fn presigner(&self) -> Option<&dyn PresignedUrls> {
        self.presign_base.as_ref().map(|_| self as &dyn PresignedUrls)
    }
}

#[async_trait]
impl PresignedUrls for MemoryObjectStore {
    async fn presigned_get(&self, key: &str, expires_in: Duration) -> AppResult<String> {
        let base = self
            .presign_base
            .as_deref()
            .ok_or_else(|| AppError::not_implemented("Presigned URLs are disabled"))?;
        Ok(format!("{base}/{key}?expires={}", expires_in.as_secs()))
    }
}
