//! Folder entity model.

use chrono::{DateTime, Utc};
use netdrive_core::types::FolderId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::file::File;

/// Name given to every owner's root folder.
pub const ROOT_FOLDER_NAME: &str = "Root";

/// A folder in an owner's hierarchy.
///
/// `folders` and `files` are populated only by assembly; they are never
/// persisted and are empty on rows read straight from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Folder {
    /// Unique folder identifier.
    pub id: FolderId,
    /// Display name.
    pub name: String,
    /// Username of the owner.
    pub owner: String,
    /// Parent folder ID (null only for the owner's root).
    pub parent_id: Option<FolderId>,
    /// When the folder was created.
    pub created_at: DateTime<Utc>,
    /// Ancestor IDs from the root down to the parent, excluding self.
    #[sqlx(rename = "path_array")]
    pub ancestry: Vec<FolderId>,
    /// Child folders, ordered by name.
    #[sqlx(skip)]
    #[serde(default)]
    pub folders: Vec<Folder>,
    /// Files directly inside this folder, ordered by name.
    #[sqlx(skip)]
    #[serde(default)]
    pub files: Vec<File>,
}

impl Folder {
    /// Check if this is a root folder (no parent).
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Ancestry that a direct child of this folder must carry.
    pub fn child_ancestry(&self) -> Vec<FolderId> {
        let mut ancestry = Vec::with_capacity(self.ancestry.len() + 1);
        ancestry.extend_from_slice(&self.ancestry);
        ancestry.push(self.id);
        ancestry
    }

    /// Find a folder by ID in this subtree (including self).
    pub fn find(&self, id: FolderId) -> Option<&Folder> {
        if self.id == id {
            return Some(self);
        }
        self.folders.iter().find_map(|child| child.find(id))
    }

    /// IDs of every folder in this subtree, self first, depth-first.
    pub fn subtree_ids(&self) -> Vec<FolderId> {
        let mut ids = vec![self.id];
        for child in &self.folders {
            ids.extend(child.subtree_ids());
        }
        ids
    }

    /// Total number of folders in this subtree, including self.
    pub fn folder_count(&self) -> usize {
        1 + self.folders.iter().map(Folder::folder_count).sum::<usize>()
    }

    /// Total number of files in this subtree.
    pub fn file_count(&self) -> usize {
        self.files.len() + self.folders.iter().map(Folder::file_count).sum::<usize>()
    }
}

/// Data required to create a new folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFolder {
    /// Folder name.
    pub name: String,
    /// Username of the owner.
    pub owner: String,
    /// Parent folder (None only for the root).
    pub parent_id: Option<FolderId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(name: &str, parent: Option<&Folder>) -> Folder {
        Folder {
            id: FolderId::new(),
            name: name.to_string(),
            owner: "alice".to_string(),
            parent_id: parent.map(|p| p.id),
            created_at: Utc::now(),
            ancestry: parent.map(Folder::child_ancestry).unwrap_or_default(),
            folders: Vec::new(),
            files: Vec::new(),
        }
    }

    #[test]
    fn test_child_ancestry_appends_self() {
        let root = folder(ROOT_FOLDER_NAME, None);
        let docs = folder("docs", Some(&root));
        let deep = folder("deep", Some(&docs));

        assert!(root.is_root());
        assert_eq!(docs.ancestry, vec![root.id]);
        assert_eq!(deep.ancestry, vec![root.id, docs.id]);
    }

    #[test]
    fn test_find_and_subtree_ids() {
        let mut root = folder(ROOT_FOLDER_NAME, None);
        let mut docs = folder("docs", Some(&root));
        let deep = folder("deep", Some(&docs));
        let deep_id = deep.id;
        let docs_id = docs.id;
        docs.folders.push(deep);
        root.folders.push(docs);

        assert_eq!(root.find(deep_id).map(|f| f.name.as_str()), Some("deep"));
        assert_eq!(root.subtree_ids(), vec![root.id, docs_id, deep_id]);
        assert_eq!(root.folder_count(), 3);
        assert!(root.find(FolderId::new()).is_none());
    }
}
