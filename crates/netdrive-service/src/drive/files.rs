//! Single-file operations and flat file archives.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use netdrive_core::error::AppError;
use netdrive_core::result::{AppResult, DriveResult};
use netdrive_core::traits::storage::ByteStream;
use netdrive_core::types::{FileId, FolderId};
use netdrive_entity::file::{CreateFile, File};

use crate::archive::sanitize_component;

use super::{DriveService, NamedArchive, require_name, require_owner};

impl DriveService {
    /// Store a new file in `folder_id`, or in the owner's root folder when
    /// no folder is given.
    ///
    /// The object is written before the record. If the record cannot be
    /// saved the object is deleted again.
    pub async fn upload_file(
        &self,
        owner: &str,
        name: &str,
        content: ByteStream,
        folder_id: Option<FolderId>,
    ) -> AppResult<File> {
        let name = require_name(name, "File")?;
        let folder = match folder_id {
            Some(id) => {
                let folder = self.require_folder(id).await?;
                require_owner(owner, &folder.owner, "Folder")?;
                folder
            }
            None => self.metadata.ensure_root_folder(owner).await?,
        };

        let file_id = FileId::new();
        let storage_key = File::storage_key_for(owner, folder.id, file_id);
        let size = self.store.put(&storage_key, content).await?;

        let record = CreateFile {
            id: file_id,
            folder_id: folder.id,
            name,
            storage_key: storage_key.clone(),
            size: i64::try_from(size).unwrap_or(i64::MAX),
            owner: owner.to_string(),
        };

        match self.metadata.create_file_record(&record).await {
            Ok(file) => {
                info!(owner, file_id = %file.id, bytes = size, "File uploaded");
                Ok(file)
            }
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&storage_key).await {
                    warn!(key = %storage_key, error = %cleanup, "Failed to roll back uploaded object");
                }
                Err(e)
            }
        }
    }

    /// A file's record and a stream of its content.
    pub async fn download_file(&self, file_id: FileId) -> AppResult<(File, ByteStream)> {
        let file = self.require_file(file_id).await?;
        let content = self.store.open(&file.storage_key).await?;
        Ok((file, content))
    }

    /// Delete a file's content, then its record.
    pub async fn delete_file(&self, owner: &str, file_id: FileId) -> AppResult<()> {
        let file = self.require_file(file_id).await?;
        require_owner(owner, &file.owner, "File")?;

        self.store.delete(&file.storage_key).await?;
        self.metadata.delete_file_record(file_id).await?;
        info!(owner, %file_id, "File deleted");
        Ok(())
    }

    /// The owner's files, newest first.
    pub async fn list_files(&self, owner: &str) -> AppResult<Vec<File>> {
        self.metadata.list_files_by_owner(owner).await
    }

    /// A time-limited direct download URL, when the object store can issue
    /// one.
    pub async fn file_download_url(&self, file_id: FileId) -> AppResult<String> {
        let file = self.require_file(file_id).await?;
        let presigner = self.store.presigner().ok_or_else(|| {
            AppError::not_implemented(format!(
                "The '{}' object store cannot issue download URLs",
                self.store.provider_type()
            ))
        })?;
        presigner
            .presigned_get(&file.storage_key, self.presign_expiry)
            .await
    }

    /// A flat archive of the owner's files, or of the selected ones.
    ///
    /// Every selected id must name a file of `owner`.
    pub async fn download_files(
        &self,
        owner: &str,
        selected: Option<&[FileId]>,
        cancel: &CancellationToken,
    ) -> DriveResult<NamedArchive> {
        let mut files = self.list_files(owner).await?;

        if let Some(ids) = selected {
            let wanted: HashSet<FileId> = ids.iter().copied().collect();
            files.retain(|f| wanted.contains(&f.id));
            if files.len() != wanted.len() {
                let found: HashSet<FileId> = files.iter().map(|f| f.id).collect();
                let missing: Vec<String> = ids
                    .iter()
                    .filter(|id| !found.contains(*id))
                    .map(ToString::to_string)
                    .collect();
                return Err(AppError::not_found(format!(
                    "Files not found: {}",
                    missing.join(", ")
                ))
                .into());
            }
        }

        let archive = self.archiver.build_flat(&files, cancel).await?;
        Ok(NamedArchive {
            file_name: format!("{}-files.zip", sanitize_component(owner)),
            archive,
        })
    }

    async fn require_file(&self, file_id: FileId) -> AppResult<File> {
        self.metadata
            .find_file(file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }
}
