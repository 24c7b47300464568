//! Flat hierarchy projection.

use chrono::{DateTime, Utc};
use netdrive_core::types::{FileId, FolderId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of the recursive hierarchy query.
///
/// Each row describes a folder and, when the query joins files, at most one
/// file inside it. A folder with several files appears once per file
/// (fan-out); a folder without files appears once with all file columns null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HierarchyRow {
    pub folder_id: FolderId,
    pub name: String,
    pub parent_id: Option<FolderId>,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub ancestry: Vec<FolderId>,
    pub file_id: Option<FileId>,
    pub file_name: Option<String>,
    pub file_key: Option<String>,
    pub file_size: Option<i64>,
    pub file_uploaded_at: Option<DateTime<Utc>>,
    pub file_is_dir: Option<bool>,
}

impl HierarchyRow {
    /// Whether any file column is populated.
    pub fn has_file(&self) -> bool {
        self.file_id.is_some()
            || self.file_name.is_some()
            || self.file_key.is_some()
            || self.file_size.is_some()
            || self.file_uploaded_at.is_some()
            || self.file_is_dir.is_some()
    }
}
