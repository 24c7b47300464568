//! File entity model.

use chrono::{DateTime, Utc};
use netdrive_core::types::{FileId, FolderId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A file stored in NetDrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct File {
    /// Unique file identifier.
    pub id: FileId,
    /// Display name (including extension).
    pub name: String,
    /// Object store key addressing the content. Immutable once written.
    #[sqlx(rename = "path")]
    pub storage_key: String,
    /// File size in bytes.
    pub size: i64,
    /// The folder containing this file.
    pub folder_id: FolderId,
    /// Username of the owner.
    pub owner: String,
    /// When the file was uploaded.
    pub uploaded_at: DateTime<Utc>,
    /// Marks storage-layer placeholder entries that carry no content.
    pub is_dir: bool,
}

impl File {
    /// Build the storage key for a new upload: `owner/folder_id/file_id`.
    pub fn storage_key_for(owner: &str, folder_id: FolderId, file_id: FileId) -> String {
        format!("{owner}/{folder_id}/{file_id}")
    }

    /// Whether this entry is a placeholder rather than real content.
    pub fn is_placeholder(&self) -> bool {
        self.is_dir
    }
}

/// Data required to create a new file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFile {
    /// Pre-allocated identifier; also the last segment of the storage key.
    pub id: FileId,
    /// The folder to place the file in.
    pub folder_id: FolderId,
    /// Display name.
    pub name: String,
    /// Object store key.
    pub storage_key: String,
    /// File size in bytes.
    pub size: i64,
    /// Username of the owner.
    pub owner: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_layout() {
        let folder = FolderId::new();
        let file = FileId::new();
        assert_eq!(
            File::storage_key_for("alice", folder, file),
            format!("alice/{folder}/{file}")
        );
    }
}
