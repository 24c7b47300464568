//! The metadata seam consumed by the drive service.

use async_trait::async_trait;
use sqlx::PgPool;

use netdrive_core::result::AppResult;
use netdrive_core::types::{FileId, FolderId};
use netdrive_entity::file::{CreateFile, File};
use netdrive_entity::folder::{CreateFolder, Folder, HierarchyRow};

use crate::repositories::{FileRepository, FolderRepository};

/// Relational metadata for folders and files.
///
/// [`PgMetadataStore`] is the production implementation; tests substitute an
/// in-memory one.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    /// Flat rows of the owner's whole tree, every parent before its
    /// children. With `include_files`, one row per contained file.
    async fn list_folder_hierarchy_rows(
        &self,
        owner: &str,
        include_files: bool,
    ) -> AppResult<Vec<HierarchyRow>>;

    /// Direct subfolders and direct non-placeholder files of a folder.
    async fn list_direct_children(&self, folder_id: FolderId)
    -> AppResult<(Vec<Folder>, Vec<File>)>;

    /// Find a folder by ID.
    async fn find_folder(&self, folder_id: FolderId) -> AppResult<Option<Folder>>;

    /// Find the owner's root folder.
    async fn find_root_folder(&self, owner: &str) -> AppResult<Option<Folder>>;

    /// Create the owner's root folder if missing and return it.
    async fn ensure_root_folder(&self, owner: &str) -> AppResult<Folder>;

    /// Create a non-root folder under an existing parent of the same owner.
    async fn create_folder(&self, data: &CreateFolder) -> AppResult<Folder>;

    /// Find a file by ID.
    async fn find_file(&self, file_id: FileId) -> AppResult<Option<File>>;

    /// The owner's non-placeholder files, newest first.
    async fn list_files_by_owner(&self, owner: &str) -> AppResult<Vec<File>>;

    /// Insert a file record.
    async fn create_file_record(&self, data: &CreateFile) -> AppResult<File>;

    /// Delete a file record. Returns `true` if it existed.
    async fn delete_file_record(&self, file_id: FileId) -> AppResult<bool>;

    /// Remove the given folders and all file rows inside them in one
    /// transaction. Returns `(files_deleted, folders_deleted)`.
    async fn delete_folder_tree(&self, folder_ids: &[FolderId]) -> AppResult<(u64, u64)>;
}

/// [`MetadataStore`] backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgMetadataStore {
    folders: FolderRepository,
    files: FileRepository,
}

impl PgMetadataStore {
    /// Create a metadata store over a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            folders: FolderRepository::new(pool.clone()),
            files: FileRepository::new(pool),
        }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn list_folder_hierarchy_rows(
        &self,
        owner: &str,
        include_files: bool,
    ) -> AppResult<Vec<HierarchyRow>> {
        self.folders.hierarchy_rows(owner, include_files).await
    }

    async fn list_direct_children(
        &self,
        folder_id: FolderId,
    ) -> AppResult<(Vec<Folder>, Vec<File>)> {
        let folders = self.folders.find_children(folder_id).await?;
        let files = self.files.find_by_folder(folder_id).await?;
        Ok((folders, files))
    }

    async fn find_folder(&self, folder_id: FolderId) -> AppResult<Option<Folder>> {
        self.folders.find_by_id(folder_id).await
    }

    async fn find_root_folder(&self, owner: &str) -> AppResult<Option<Folder>> {
        self.folders.find_root(owner).await
    }

    async fn ensure_root_folder(&self, owner: &str) -> AppResult<Folder> {
        match self.folders.find_root(owner).await? {
            Some(root) => Ok(root),
            None => self.folders.create_root(owner).await,
        }
    }

    async fn create_folder(&self, data: &CreateFolder) -> AppResult<Folder> {
        self.folders.create(data).await
    }

    async fn find_file(&self, file_id: FileId) -> AppResult<Option<File>> {
        self.files.find_by_id(file_id).await
    }

    async fn list_files_by_owner(&self, owner: &str) -> AppResult<Vec<File>> {
        self.files.find_by_owner(owner).await
    }

    async fn create_file_record(&self, data: &CreateFile) -> AppResult<File> {
        self.files.create(data).await
    }

    async fn delete_file_record(&self, file_id: FileId) -> AppResult<bool> {
        self.files.delete(file_id).await
    }

    async fn delete_folder_tree(&self, folder_ids: &[FolderId]) -> AppResult<(u64, u64)> {
        self.folders.delete_tree(folder_ids).await
    }
}
