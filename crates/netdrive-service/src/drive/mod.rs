//! The drive façade: hierarchy assembly, archive downloads, and prefix
//! erasure over the metadata and object stores.

mod files;
mod folders;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use netdrive_core::error::AppError;
use netdrive_core::result::DriveResult;
use netdrive_core::traits::storage::ObjectStore;
use netdrive_core::types::FolderId;
use netdrive_database::MetadataStore;
use netdrive_entity::folder::Folder;
use netdrive_storage::{BulkEraser, EraseOptions, EraseReport, StorageManager};

use crate::archive::{ArchiveBuilder, ArchiveStream};
use crate::folder::HierarchyAssembler;

pub use folders::FolderDeletion;

/// An archive together with the file name to offer it under.
#[derive(Debug)]
pub struct NamedArchive {
    /// Suggested download name, ending in `.zip`.
    pub file_name: String,
    /// The archive content.
    pub archive: ArchiveStream,
}

/// Orchestrates the metadata store, the object store, and the archive and
/// erase pipelines.
#[derive(Clone)]
pub struct DriveService {
    metadata: Arc<dyn MetadataStore>,
    store: Arc<dyn ObjectStore>,
    eraser: BulkEraser,
    archiver: ArchiveBuilder,
    presign_expiry: Duration,
}

impl fmt::Debug for DriveService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveService")
            .field("store", &self.store.provider_type())
            .field("presign_expiry", &self.presign_expiry)
            .finish_non_exhaustive()
    }
}

impl DriveService {
    /// Creates a drive service over a metadata store and a storage manager.
    pub fn new(metadata: Arc<dyn MetadataStore>, storage: &StorageManager) -> Self {
        let transfer = storage.transfer();
        Self {
            metadata,
            store: storage.store(),
            eraser: storage.eraser(),
            archiver: ArchiveBuilder::new(
                storage.store(),
                transfer.copy_chunk_bytes,
                transfer.archive_channel_depth,
            ),
            presign_expiry: storage.presign_expiry(),
        }
    }

    /// Every folder of `owner` with its files, as a forest (normally a
    /// single root).
    pub async fn assemble_full_hierarchy(&self, owner: &str) -> DriveResult<Vec<Folder>> {
        let rows = self.metadata.list_folder_hierarchy_rows(owner, true).await?;
        debug!(owner, rows = rows.len(), "Assembling hierarchy");
        HierarchyAssembler::assemble(rows)
    }

    /// Like [`assemble_full_hierarchy`](Self::assemble_full_hierarchy)
    /// without the file join; every folder has an empty file list.
    pub async fn assemble_folder_hierarchy(&self, owner: &str) -> DriveResult<Vec<Folder>> {
        let rows = self
            .metadata
            .list_folder_hierarchy_rows(owner, false)
            .await?;
        HierarchyAssembler::assemble(rows)
    }

    /// A folder with its direct subfolders and direct files only.
    pub async fn assemble_one_level(&self, folder_id: FolderId) -> DriveResult<Folder> {
        let folder = self.require_folder(folder_id).await?;
        let (subfolders, files) = self.metadata.list_direct_children(folder_id).await?;
        HierarchyAssembler::one_level(folder, subfolders, files)
    }

    /// Stream an assembled folder subtree into a zip archive.
    pub async fn build_archive(
        &self,
        root: &Folder,
        cancel: &CancellationToken,
    ) -> DriveResult<ArchiveStream> {
        self.archiver.build(root, cancel).await
    }

    /// Delete every object under `prefix`.
    pub async fn erase_under_prefix(
        &self,
        prefix: &str,
        options: EraseOptions,
        cancel: &CancellationToken,
    ) -> DriveResult<EraseReport> {
        self.eraser.erase(prefix, options, cancel).await
    }

    async fn require_folder(&self, folder_id: FolderId) -> Result<Folder, AppError> {
        self.metadata
            .find_folder(folder_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Folder {folder_id} not found")))
    }
}

/// Fail with an authorization error unless `owner` owns the resource.
fn require_owner(owner: &str, actual: &str, what: &str) -> Result<(), AppError> {
    if owner == actual {
        Ok(())
    } else {
        Err(AppError::authorization(format!(
            "{what} belongs to another user"
        )))
    }
}

/// Reject empty and whitespace-only names.
fn require_name(name: &str, what: &str) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{what} name cannot be empty")));
    }
    Ok(trimmed.to_string())
}
