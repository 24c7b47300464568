//! Shared test helpers for drive integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::Mutex;

use netdrive_core::config::TransferConfig;
use netdrive_core::error::AppError;
use netdrive_core::result::AppResult;
use netdrive_core::traits::storage::{ByteStream, ObjectStore};
use netdrive_core::types::{FileId, FolderId};
use netdrive_database::MetadataStore;
use netdrive_entity::file::{CreateFile, File};
use netdrive_entity::folder::{CreateFolder, Folder, HierarchyRow, ROOT_FOLDER_NAME};
use netdrive_service::DriveService;
use netdrive_storage::StorageManager;
use netdrive_storage::providers::MemoryObjectStore;

/// Metadata store over two vectors, ordered the way the SQL store orders
/// hierarchy rows.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    folders: Mutex<Vec<Folder>>,
    files: Mutex<Vec<File>>,
    fail_file_inserts: AtomicBool,
}

impl InMemoryMetadataStore {
    /// Make every subsequent `create_file_record` fail.
    pub fn fail_file_inserts(&self) {
        self.fail_file_inserts.store(true, Ordering::SeqCst);
    }

    /// Insert a raw file row, bypassing the drive service.
    pub async fn insert_file(&self, file: File) {
        self.files.lock().await.push(file);
    }

    pub async fn folder_count(&self) -> usize {
        self.folders.lock().await.len()
    }

    pub async fn file_count(&self) -> usize {
        self.files.lock().await.len()
    }
}

fn row(folder: &Folder, file: Option<&File>) -> HierarchyRow {
    HierarchyRow {
        folder_id: folder.id,
        name: folder.name.clone(),
        parent_id: folder.parent_id,
        owner: folder.owner.clone(),
        created_at: folder.created_at,
        ancestry: folder.ancestry.clone(),
        file_id: file.map(|f| f.id),
        file_name: file.map(|f| f.name.clone()),
        file_key: file.map(|f| f.storage_key.clone()),
        file_size: file.map(|f| f.size),
        file_uploaded_at: file.map(|f| f.uploaded_at),
        file_is_dir: file.map(|f| f.is_dir),
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn list_folder_hierarchy_rows(
        &self,
        owner: &str,
        include_files: bool,
    ) -> AppResult<Vec<HierarchyRow>> {
        let mut folders: Vec<Folder> = self
            .folders
            .lock()
            .await
            .iter()
            .filter(|f| f.owner == owner)
            .cloned()
            .collect();
        folders.sort_by(|a, b| {
            (a.ancestry.len(), &a.ancestry, a.id).cmp(&(b.ancestry.len(), &b.ancestry, b.id))
        });

        let files = self.files.lock().await;
        let mut rows = Vec::new();
        for folder in &folders {
            let mut inside: Vec<&File> = if include_files {
                files.iter().filter(|f| f.folder_id == folder.id).collect()
            } else {
                Vec::new()
            };
            inside.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));

            if inside.is_empty() {
                rows.push(row(folder, None));
            } else {
                rows.extend(inside.into_iter().map(|f| row(folder, Some(f))));
            }
        }
        Ok(rows)
    }

    async fn list_direct_children(
        &self,
        folder_id: FolderId,
    ) -> AppResult<(Vec<Folder>, Vec<File>)> {
        let folders = self
            .folders
            .lock()
            .await
            .iter()
            .filter(|f| f.parent_id == Some(folder_id))
            .cloned()
            .collect();
        let files = self
            .files
            .lock()
            .await
            .iter()
            .filter(|f| f.folder_id == folder_id && !f.is_dir)
            .cloned()
            .collect();
        Ok((folders, files))
    }

    async fn find_folder(&self, folder_id: FolderId) -> AppResult<Option<Folder>> {
        Ok(self
            .folders
            .lock()
            .await
            .iter()
            .find(|f| f.id == folder_id)
            .cloned())
    }

    async fn find_root_folder(&self, owner: &str) -> AppResult<Option<Folder>> {
        Ok(self
            .folders
            .lock()
            .await
            .iter()
            .find(|f| f.owner == owner && f.parent_id.is_none())
            .cloned())
    }

    async fn ensure_root_folder(&self, owner: &str) -> AppResult<Folder> {
        let mut folders = self.folders.lock().await;
        if let Some(root) = folders
            .iter()
            .find(|f| f.owner == owner && f.parent_id.is_none())
        {
            return Ok(root.clone());
        }
        let root = Folder {
            id: FolderId::new(),
            name: ROOT_FOLDER_NAME.to_string(),
            owner: owner.to_string(),
            parent_id: None,
            created_at: Utc::now(),
            ancestry: Vec::new(),
            folders: Vec::new(),
            files: Vec::new(),
        };
        folders.push(root.clone());
        Ok(root)
    }

    async fn create_folder(&self, data: &CreateFolder) -> AppResult<Folder> {
        let mut folders = self.folders.lock().await;
        let parent_id = data
            .parent_id
            .ok_or_else(|| AppError::validation("Parent folder is required"))?;
        let parent = folders
            .iter()
            .find(|f| f.id == parent_id)
            .ok_or_else(|| AppError::not_found("Parent folder not found"))?;
        if parent.owner != data.owner {
            return Err(AppError::authorization("Parent folder belongs to another user"));
        }
        let folder = Folder {
            id: FolderId::new(),
            name: data.name.clone(),
            owner: data.owner.clone(),
            parent_id: Some(parent.id),
            created_at: Utc::now(),
            ancestry: parent.child_ancestry(),
            folders: Vec::new(),
            files: Vec::new(),
        };
        folders.push(folder.clone());
        Ok(folder)
    }

    async fn find_file(&self, file_id: FileId) -> AppResult<Option<File>> {
        Ok(self
            .files
            .lock()
            .await
            .iter()
            .find(|f| f.id == file_id)
            .cloned())
    }

    async fn list_files_by_owner(&self, owner: &str) -> AppResult<Vec<File>> {
        let mut files: Vec<File> = self
            .files
            .lock()
            .await
            .iter()
            .filter(|f| f.owner == owner && !f.is_dir)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(files)
    }

    async fn create_file_record(&self, data: &CreateFile) -> AppResult<File> {
        if self.fail_file_inserts.load(Ordering::SeqCst) {
            return Err(AppError::database("injected insert failure"));
        }
        let file = File {
            id: data.id,
            name: data.name.clone(),
            storage_key: data.storage_key.clone(),
            size: data.size,
            folder_id: data.folder_id,
            owner: data.owner.clone(),
            uploaded_at: Utc::now(),
            is_dir: false,
        };
        self.files.lock().await.push(file.clone());
        Ok(file)
    }

    async fn delete_file_record(&self, file_id: FileId) -> AppResult<bool> {
        let mut files = self.files.lock().await;
        let before = files.len();
        files.retain(|f| f.id != file_id);
        Ok(files.len() < before)
    }

    async fn delete_folder_tree(&self, folder_ids: &[FolderId]) -> AppResult<(u64, u64)> {
        let mut folders = self.folders.lock().await;
        let mut files = self.files.lock().await;
        let (files_before, folders_before) = (files.len(), folders.len());
        files.retain(|f| !folder_ids.contains(&f.folder_id));
        folders.retain(|f| !folder_ids.contains(&f.id));
        Ok((
            (files_before - files.len()) as u64,
            (folders_before - folders.len()) as u64,
        ))
    }
}

/// A drive service wired to in-memory stores.
pub struct TestDrive {
    pub drive: DriveService,
    pub metadata: Arc<InMemoryMetadataStore>,
    pub store: Arc<MemoryObjectStore>,
}

impl TestDrive {
    pub fn new() -> Self {
        Self::with_store(MemoryObjectStore::new())
    }

    pub fn with_store(store: MemoryObjectStore) -> Self {
        let metadata = Arc::new(InMemoryMetadataStore::default());
        let store = Arc::new(store);
        let storage = StorageManager::new(
            store.clone() as Arc<dyn ObjectStore>,
            TransferConfig::default(),
        );
        let drive = DriveService::new(metadata.clone() as Arc<dyn MetadataStore>, &storage);
        Self {
            drive,
            metadata,
            store,
        }
    }

    /// Upload `body` as `name` through the drive service.
    pub async fn upload(&self, owner: &str, name: &str, body: &str, folder: Option<FolderId>) -> File {
        self.drive
            .upload_file(owner, name, body_stream(body), folder)
            .await
            .expect("upload should succeed")
    }
}

/// A single-chunk content stream.
pub fn body_stream(body: &str) -> ByteStream {
    let chunk: Result<Bytes, std::io::Error> = Ok(Bytes::from(body.to_string()));
    Box::pin(futures::stream::iter(vec![chunk]))
}
