//! Local filesystem object store.
//!
//! Keys map onto relative paths below a root directory. A key ending in `/`
//! is a directory marker and maps onto a directory rather than a file.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::stream::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use netdrive_core::error::{AppError, ErrorKind};
use netdrive_core::result::AppResult;
use netdrive_core::traits::storage::{ByteStream, ObjectMeta, ObjectPage, ObjectStore};

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Local filesystem object store.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    /// Root directory for all stored objects.
    root: PathBuf,
    /// Maximum number of keys returned per listing page.
    page_size: usize,
}

impl LocalObjectStore {
    /// Create a new store rooted at the given path, creating it if needed.
    pub async fn new(root_path: &str, page_size: usize) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self {
            root,
            page_size: page_size.max(1),
        })
    }

    /// Resolve a key to a path within the root, rejecting traversal.
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(AppError::validation(format!(
                        "Object key escapes the storage root: {key}"
                    )));
                }
            }
        }
        Ok(self.root.join(relative))
    }

    /// Ensure the parent directory of a path exists.
    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    /// Every file key under the directory that could contain `prefix`,
    /// filtered to those starting with `prefix`, sorted.
    async fn matching_keys(&self, prefix: &str) -> AppResult<Vec<ObjectMeta>> {
        let prefix = prefix.trim_start_matches('/');
        let start_dir = match prefix.rfind('/') {
            Some(pos) => self.resolve(&prefix[..pos])?,
            None => self.root.clone(),
        };

        let mut found = Vec::new();
        let mut pending = vec![start_dir];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to list directory: {}", dir.display()),
                        e,
                    ));
                }
            };

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to read directory entry", e)
            })? {
                let meta = entry.metadata().await.map_err(|e| {
                    AppError::with_source(ErrorKind::Storage, "Failed to get entry metadata", e)
                })?;
                let path = entry.path();
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                if is_partial(&path) {
                    continue;
                }
                let Some(key) = self.key_for(&path) else {
                    continue;
                };
                if key.starts_with(prefix) {
                    found.push(ObjectMeta {
                        key,
                        size: meta.len(),
                        last_modified: meta.modified().ok().map(chrono::DateTime::from),
                    });
                }
            }
        }

        found.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(found)
    }

    /// Map an absolute path under the root back to its `/`-separated key.
    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = relative
            .components()
            .map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect();
        parts.map(|p| p.join("/"))
    }
}

fn is_partial(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "partial")
}

fn map_open_error(key: &str, e: std::io::Error) -> AppError {
    if e.kind() == std::io::ErrorKind::NotFound {
        AppError::not_found(format!("Object not found: {key}"))
    } else {
        AppError::with_source(ErrorKind::Storage, format!("Failed to open object: {key}"), e)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    async fn open(&self, key: &str) -> AppResult<ByteStream> {
        let full_path = self.resolve(key)?;
        let file = fs::File::open(&full_path)
            .await
            .map_err(|e| map_open_error(key, e))?;
        let meta = file.metadata().await.map_err(|e| map_open_error(key, e))?;
        if meta.is_dir() {
            return Err(AppError::not_found(format!("Object not found: {key}")));
        }

        Ok(Box::pin(ReaderStream::with_capacity(file, READ_CHUNK_BYTES)))
    }

    async fn put(&self, key: &str, mut stream: ByteStream) -> AppResult<u64> {
        let full_path = self.resolve(key)?;
        if key.ends_with('/') {
            fs::create_dir_all(&full_path).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create directory marker: {key}"),
                    e,
                )
            })?;
            return Ok(0);
        }
        self.ensure_parent(&full_path).await?;

        // Written under a sibling name and renamed so readers never observe
        // a half-written object.
        let partial = full_path.with_extension(format!("{}.partial", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&partial).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create object: {key}"),
                e,
            )
        })?;

        let mut total_bytes = 0u64;
        let copied: AppResult<()> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| {
                    AppError::with_source(ErrorKind::Storage, "Upload stream read error", e)
                })?;
                total_bytes += chunk.len() as u64;
                file.write_all(&chunk).await.map_err(|e| {
                    AppError::with_source(ErrorKind::Storage, "Failed to write chunk", e)
                })?;
            }
            file.flush()
                .await
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to flush", e))
        }
        .await;

        drop(file);
        if let Err(e) = copied {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }

        fs::rename(&partial, &full_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to commit object: {key}"),
                e,
            )
        })?;

        debug!(key, bytes = total_bytes, "Stored object");
        Ok(total_bytes)
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let full_path = self.resolve(key)?;
        let result = if key.ends_with('/') {
            fs::remove_dir(&full_path).await
        } else {
            fs::remove_file(&full_path).await
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete object: {key}"),
                e,
            )),
        }
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let full_path = self.resolve(key)?;
        match fs::metadata(&full_path).await {
            Ok(meta) => Ok(meta.is_dir() == key.ends_with('/')),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to stat object: {key}"),
                e,
            )),
        }
    }

    async fn list_page(&self, prefix: &str, token: Option<String>) -> AppResult<ObjectPage> {
        let all = self.matching_keys(prefix).await?;
        let mut remaining = all
            .into_iter()
            .filter(|meta| token.as_deref().is_none_or(|t| meta.key.as_str() > t));

        let objects: Vec<ObjectMeta> = remaining.by_ref().take(self.page_size).collect();
        let next_token = match (remaining.next(), objects.last()) {
            (Some(_), Some(last)) => Some(last.key.clone()),
            _ => None,
        };

        Ok(ObjectPage {
            objects,
            next_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::TryStreamExt;

    use super::*;

    fn body(data: &'static str) -> ByteStream {
        Box::pin(futures::stream::iter([Ok(Bytes::from_static(data.as_bytes()))]))
    }

    async fn read_all(store: &LocalObjectStore, key: &str) -> Vec<u8> {
        let chunks: Vec<Bytes> = store.open(key).await.unwrap().try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn test_put_open_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_str().unwrap(), 100)
            .await
            .unwrap();

        let written = store.put("alice/f1/a", body("hello world")).await.unwrap();
        assert_eq!(written, 11);
        assert!(store.exists("alice/f1/a").await.unwrap());
        assert_eq!(read_all(&store, "alice/f1/a").await, b"hello world");

        store.delete("alice/f1/a").await.unwrap();
        assert!(!store.exists("alice/f1/a").await.unwrap());
        // Deleting again is still a success.
        store.delete("alice/f1/a").await.unwrap();
    }

    #[tokio::test]
    async fn test_open_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_str().unwrap(), 100)
            .await
            .unwrap();

        let err = store.open("nobody/here").await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_str().unwrap(), 100)
            .await
            .unwrap();

        let err = store.put("../escape", body("x")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_list_by_prefix_spans_pages() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_str().unwrap(), 3)
            .await
            .unwrap();

        for i in 0..7 {
            store
                .put(&format!("bob/docs/{i}"), body("x"))
                .await
                .unwrap();
        }
        store.put("bob/other/z", body("x")).await.unwrap();
        store.put("bobby/docs/0", body("x")).await.unwrap();

        let first = store.list_page("bob/docs/", None).await.unwrap();
        assert_eq!(first.objects.len(), 3);
        assert_eq!(first.next_token.as_deref(), Some("bob/docs/2"));

        let keys: Vec<String> = store
            .list_by_prefix("bob/docs/")
            .map_ok(|meta| meta.key)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(keys.len(), 7);
        assert_eq!(keys[0], "bob/docs/0");
        assert_eq!(keys[6], "bob/docs/6");
    }

    #[tokio::test]
    async fn test_directory_marker_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_str().unwrap(), 100)
            .await
            .unwrap();

        store.create_marker("carol/f1").await.unwrap();
        assert!(store.exists("carol/f1/").await.unwrap());
        assert!(store.list_page("carol/f1/", None).await.unwrap().objects.is_empty());

        store.delete("carol/f1/").await.unwrap();
        assert!(!store.exists("carol/f1/").await.unwrap());
    }
}
