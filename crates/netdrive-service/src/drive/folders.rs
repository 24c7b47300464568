//! Folder operations: root bootstrap, creation, listing, archive download,
//! and recursive deletion.

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use netdrive_core::error::{AppError, DeletionFailure, DriveError};
use netdrive_core::result::{AppResult, DriveResult};
use netdrive_core::types::FolderId;
use netdrive_entity::folder::{CreateFolder, Folder};
use netdrive_storage::EraseOptions;

use crate::archive::sanitize_component;

use super::{DriveService, NamedArchive, require_name, require_owner};

/// What a folder deletion removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderDeletion {
    /// Folder rows removed, including the target.
    pub folders: u64,
    /// File rows removed.
    pub files: u64,
    /// Objects deleted from the object store.
    pub objects: usize,
}

impl DriveService {
    /// The owner's root folder.
    pub async fn get_root_folder(&self, owner: &str) -> AppResult<Folder> {
        self.metadata
            .find_root_folder(owner)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No root folder for '{owner}'")))
    }

    /// The owner's root folder, created on first use.
    pub async fn ensure_root_folder(&self, owner: &str) -> AppResult<Folder> {
        self.metadata.ensure_root_folder(owner).await
    }

    /// Create a folder under `parent_id`, or under the owner's root folder.
    pub async fn create_folder(
        &self,
        owner: &str,
        name: &str,
        parent_id: Option<FolderId>,
    ) -> AppResult<Folder> {
        let name = require_name(name, "Folder")?;
        let parent_id = match parent_id {
            Some(id) => id,
            None => self.metadata.ensure_root_folder(owner).await?.id,
        };

        let folder = self
            .metadata
            .create_folder(&CreateFolder {
                name,
                owner: owner.to_string(),
                parent_id: Some(parent_id),
            })
            .await?;

        info!(owner, folder_id = %folder.id, parent_id = %parent_id, "Folder created");
        Ok(folder)
    }

    /// One-level view of a folder the caller owns.
    pub async fn folder_content(&self, owner: &str, folder_id: FolderId) -> DriveResult<Folder> {
        let folder = self.assemble_one_level(folder_id).await?;
        require_owner(owner, &folder.owner, "Folder")?;
        Ok(folder)
    }

    /// A zip archive of a folder's whole subtree.
    pub async fn download_folder(
        &self,
        owner: &str,
        folder_id: FolderId,
        cancel: &CancellationToken,
    ) -> DriveResult<NamedArchive> {
        let subtree = self.owned_subtree(owner, folder_id, true).await?;
        let archive = self.build_archive(&subtree, cancel).await?;
        Ok(NamedArchive {
            file_name: format!("{}.zip", sanitize_component(&subtree.name)),
            archive,
        })
    }

    /// Delete a folder, its descendants, and all of their content.
    ///
    /// Objects under `owner/<id>/` are erased for every folder in the
    /// subtree first. Metadata is removed only when every erase succeeded;
    /// otherwise the failures are returned together and the rows stay so
    /// the deletion can be retried.
    #[instrument(skip(self, cancel))]
    pub async fn delete_folder(
        &self,
        owner: &str,
        folder_id: FolderId,
        cancel: &CancellationToken,
    ) -> DriveResult<FolderDeletion> {
        let subtree = self.owned_subtree(owner, folder_id, false).await?;
        if subtree.is_root() {
            return Err(AppError::validation("The root folder cannot be deleted").into());
        }

        let ids = subtree.subtree_ids();
        let mut attempted = 0usize;
        let mut objects = 0usize;
        let mut failures: Vec<DeletionFailure> = Vec::new();

        for id in &ids {
            let prefix = folder_prefix(owner, *id);
            match self
                .eraser
                .erase(&prefix, EraseOptions::default(), cancel)
                .await
            {
                Ok(report) => {
                    attempted += report.attempted;
                    objects += report.deleted;
                }
                Err(DriveError::AggregatedDeletion {
                    attempted: tried,
                    failures: failed,
                    ..
                }) => {
                    attempted += tried;
                    objects += tried.saturating_sub(failed.len());
                    failures.extend(failed);
                }
                Err(other) => return Err(other),
            }
        }

        if !failures.is_empty() {
            failures.sort_by(|a, b| a.key.cmp(&b.key));
            warn!(
                owner,
                failed = failures.len(),
                "Folder content not fully erased; metadata kept"
            );
            return Err(DriveError::AggregatedDeletion {
                prefix: folder_prefix(owner, folder_id),
                attempted,
                failures,
            });
        }

        // Clear leftover directory markers now that each prefix is empty.
        let safe = EraseOptions {
            parallel: false,
            safe: true,
        };
        for id in &ids {
            self.eraser
                .erase(&folder_prefix(owner, *id), safe, cancel)
                .await?;
        }

        let (files, folders) = self.metadata.delete_folder_tree(&ids).await?;
        info!(owner, folders, files, objects, "Folder deleted");
        Ok(FolderDeletion {
            folders,
            files,
            objects,
        })
    }

    /// Locate `folder_id` inside the owner's assembled hierarchy.
    async fn owned_subtree(
        &self,
        owner: &str,
        folder_id: FolderId,
        include_files: bool,
    ) -> DriveResult<Folder> {
        let folder = self.require_folder(folder_id).await?;
        require_owner(owner, &folder.owner, "Folder")?;

        let forest = if include_files {
            self.assemble_full_hierarchy(owner).await?
        } else {
            self.assemble_folder_hierarchy(owner).await?
        };

        forest
            .into_iter()
            .find_map(|root| root.find(folder_id).cloned())
            .ok_or_else(|| {
                DriveError::corrupt(folder_id, "folder is not reachable from the owner's root")
            })
    }
}

fn folder_prefix(owner: &str, folder_id: FolderId) -> String {
    format!("{owner}/{folder_id}/")
}
