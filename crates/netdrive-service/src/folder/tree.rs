//! Folder tree assembly from flat hierarchy rows.
//!
//! Rows arrive parents-first, one per (folder, file) pair. Nodes are kept in
//! an arena indexed by insertion order, so a child's index is always greater
//! than its parent's. Materialization walks the arena backwards and moves
//! each finished node into its parent.

use std::collections::HashMap;

use netdrive_core::error::DriveError;
use netdrive_core::result::DriveResult;
use netdrive_core::types::FolderId;
use netdrive_entity::file::File;
use netdrive_entity::folder::{Folder, HierarchyRow};

/// Builds in-memory folder trees from flat relational rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyAssembler;

struct Node {
    folder: Folder,
    parent: Option<usize>,
}

impl HierarchyAssembler {
    /// Assemble the forest described by `rows`.
    ///
    /// Every folder row must come after its parent's. Fan-out rows for a
    /// folder already seen only contribute their file. Children and files of
    /// every node are stably ordered by name.
    pub fn assemble(rows: impl IntoIterator<Item = HierarchyRow>) -> DriveResult<Vec<Folder>> {
        let mut arena: Vec<Node> = Vec::new();
        let mut index: HashMap<FolderId, usize> = HashMap::new();

        for row in rows {
            let file = file_from_row(&row)?;

            let idx = match index.get(&row.folder_id) {
                Some(&idx) => {
                    if arena[idx].folder.parent_id != row.parent_id {
                        return Err(DriveError::corrupt(
                            row.folder_id,
                            "folder appears with two different parents",
                        ));
                    }
                    idx
                }
                None => {
                    let parent = match row.parent_id {
                        None => {
                            if !row.ancestry.is_empty() {
                                return Err(DriveError::corrupt(
                                    row.folder_id,
                                    "root folder carries a non-empty ancestry",
                                ));
                            }
                            None
                        }
                        Some(parent_id) => {
                            let &parent_idx = index.get(&parent_id).ok_or_else(|| {
                                DriveError::corrupt(
                                    row.folder_id,
                                    format!("parent {parent_id} has not been seen yet"),
                                )
                            })?;
                            check_child_of(&row, &arena[parent_idx].folder)?;
                            Some(parent_idx)
                        }
                    };

                    let idx = arena.len();
                    index.insert(row.folder_id, idx);
                    arena.push(Node {
                        folder: folder_from_row(&row),
                        parent,
                    });
                    idx
                }
            };

            if let Some(file) = file {
                arena[idx].folder.files.push(file);
            }
        }

        Ok(materialize(arena))
    }

    /// Assemble a single-level view: `folder` with its direct subfolders and
    /// direct non-placeholder files.
    pub fn one_level(
        mut folder: Folder,
        subfolders: Vec<Folder>,
        files: Vec<File>,
    ) -> DriveResult<Folder> {
        if let Some(stray) = subfolders.iter().find(|f| f.parent_id != Some(folder.id)) {
            return Err(DriveError::corrupt(
                stray.id,
                format!("listed as a child of {} but has another parent", folder.id),
            ));
        }

        folder.folders = subfolders;
        folder.files = files.into_iter().filter(|f| !f.is_placeholder()).collect();
        sort_level(&mut folder);
        Ok(folder)
    }
}

fn check_child_of(row: &HierarchyRow, parent: &Folder) -> DriveResult<()> {
    if row.owner != parent.owner {
        return Err(DriveError::corrupt(
            row.folder_id,
            format!(
                "owner '{}' differs from parent owner '{}'",
                row.owner, parent.owner
            ),
        ));
    }
    if row.ancestry != parent.child_ancestry() {
        return Err(DriveError::corrupt(
            row.folder_id,
            "ancestry does not extend the parent's ancestry",
        ));
    }
    Ok(())
}

fn folder_from_row(row: &HierarchyRow) -> Folder {
    Folder {
        id: row.folder_id,
        name: row.name.clone(),
        owner: row.owner.clone(),
        parent_id: row.parent_id,
        created_at: row.created_at,
        ancestry: row.ancestry.clone(),
        folders: Vec::new(),
        files: Vec::new(),
    }
}

/// The file carried by a row, if any. File columns are all-or-nothing.
fn file_from_row(row: &HierarchyRow) -> DriveResult<Option<File>> {
    if !row.has_file() {
        return Ok(None);
    }

    match (
        row.file_id,
        &row.file_name,
        &row.file_key,
        row.file_size,
        row.file_uploaded_at,
        row.file_is_dir,
    ) {
        (Some(id), Some(name), Some(key), Some(size), Some(uploaded_at), Some(is_dir)) => {
            Ok(Some(File {
                id,
                name: name.clone(),
                storage_key: key.clone(),
                size,
                folder_id: row.folder_id,
                owner: row.owner.clone(),
                uploaded_at,
                is_dir,
            }))
        }
        _ => Err(DriveError::corrupt(
            row.folder_id,
            "row carries partial file columns",
        )),
    }
}

fn materialize(mut arena: Vec<Node>) -> Vec<Folder> {
    let mut roots = Vec::new();

    // Children always sit after their parent, so by the time a node is
    // popped every one of its children has already been attached to it.
    while let Some(Node { mut folder, parent }) = arena.pop() {
        // Children were attached last-first; restore row order before the
        // stable sort so equal names keep their original order.
        folder.folders.reverse();
        sort_level(&mut folder);

        match parent {
            Some(parent_idx) => arena[parent_idx].folder.folders.push(folder),
            None => roots.push(folder),
        }
    }

    roots.reverse();
    roots.sort_by(|a, b| a.name.cmp(&b.name));
    roots
}

fn sort_level(folder: &mut Folder) {
    folder.folders.sort_by(|a, b| a.name.cmp(&b.name));
    folder.files.sort_by(|a, b| a.name.cmp(&b.name));
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use netdrive_core::error::ErrorKind;
    use netdrive_core::types::FileId;

    use super::*;

    fn folder_row(id: FolderId, name: &str, parent: Option<&HierarchyRow>) -> HierarchyRow {
        let ancestry = parent
            .map(|p| {
                let mut a = p.ancestry.clone();
                a.push(p.folder_id);
                a
            })
            .unwrap_or_default();
        HierarchyRow {
            folder_id: id,
            name: name.to_string(),
            parent_id: parent.map(|p| p.folder_id),
            owner: "alice".to_string(),
            created_at: Utc::now(),
            ancestry,
            file_id: None,
            file_name: None,
            file_key: None,
            file_size: None,
            file_uploaded_at: None,
            file_is_dir: None,
        }
    }

    fn with_file(row: &HierarchyRow, name: &str) -> HierarchyRow {
        let file_id = FileId::new();
        HierarchyRow {
            file_id: Some(file_id),
            file_name: Some(name.to_string()),
            file_key: Some(format!("alice/{}/{file_id}", row.folder_id)),
            file_size: Some(1),
            file_uploaded_at: Some(Utc::now()),
            file_is_dir: Some(false),
            ..row.clone()
        }
    }

    /// Root > {docs > {deep}, pics}; docs has 3 files, root has 1.
    fn sample() -> Vec<HierarchyRow> {
        let root = folder_row(FolderId::new(), "Root", None);
        let docs = folder_row(FolderId::new(), "docs", Some(&root));
        let pics = folder_row(FolderId::new(), "pics", Some(&root));
        let deep = folder_row(FolderId::new(), "deep", Some(&docs));
        vec![
            with_file(&root, "readme.txt"),
            with_file(&docs, "c.txt"),
            with_file(&docs, "a.txt"),
            with_file(&docs, "b.txt"),
            pics.clone(),
            deep,
        ]
    }

    fn count(folder: &Folder) -> usize {
        1 + folder.folders.iter().map(count).sum::<usize>()
    }

    fn edges(folder: &Folder, out: &mut Vec<(FolderId, FolderId)>) {
        for child in &folder.folders {
            out.push((folder.id, child.id));
            edges(child, out);
        }
    }

    #[test]
    fn test_nodes_and_edges_match_rows() {
        let rows = sample();
        let forest = HierarchyAssembler::assemble(rows.clone()).unwrap();

        assert_eq!(forest.len(), 1);
        let root = &forest[0];
        let mut distinct: Vec<FolderId> = rows.iter().map(|r| r.folder_id).collect();
        distinct.sort();
        distinct.dedup();
        assert_eq!(count(root), distinct.len());

        let mut got = Vec::new();
        edges(root, &mut got);
        got.sort();
        let mut want: Vec<(FolderId, FolderId)> = rows
            .iter()
            .filter_map(|r| r.parent_id.map(|p| (p, r.folder_id)))
            .collect();
        want.sort();
        want.dedup();
        assert_eq!(got, want);
    }

    #[test]
    fn test_fan_out_rows_collapse_into_one_node() {
        let forest = HierarchyAssembler::assemble(sample()).unwrap();
        let root = &forest[0];

        assert_eq!(root.files.len(), 1);
        let docs = &root.folders[0];
        assert_eq!(docs.name, "docs");
        let names: Vec<&str> = docs.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
        assert!(docs.files.iter().all(|f| f.folder_id == docs.id));
        assert_eq!(docs.folders[0].name, "deep");
        assert!(docs.folders[0].files.is_empty());
        assert!(root.folders[1].files.is_empty());
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let rows = sample();
        let first = HierarchyAssembler::assemble(rows.clone()).unwrap();
        let second = HierarchyAssembler::assemble(rows).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_child_before_parent_is_corrupt() {
        let root = folder_row(FolderId::new(), "Root", None);
        let docs = folder_row(FolderId::new(), "docs", Some(&root));
        let deep = folder_row(FolderId::new(), "deep", Some(&docs));

        let err = HierarchyAssembler::assemble(vec![root, deep.clone(), docs]).unwrap_err();
        match err {
            DriveError::CorruptHierarchy { folder_id, .. } => assert_eq!(folder_id, deep.folder_id),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_inconsistent_rows_are_corrupt() {
        let root = folder_row(FolderId::new(), "Root", None);
        let docs = folder_row(FolderId::new(), "docs", Some(&root));

        let mut wrong_ancestry = docs.clone();
        wrong_ancestry.ancestry = vec![];
        let err = HierarchyAssembler::assemble(vec![root.clone(), wrong_ancestry]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);

        let mut other_owner = docs.clone();
        other_owner.owner = "mallory".to_string();
        assert!(HierarchyAssembler::assemble(vec![root.clone(), other_owner]).is_err());

        let mut partial = with_file(&docs, "x.txt");
        partial.file_key = None;
        assert!(HierarchyAssembler::assemble(vec![root.clone(), partial]).is_err());

        let mut moved = docs.clone();
        moved.parent_id = None;
        assert!(HierarchyAssembler::assemble(vec![root.clone(), docs, moved]).is_err());

        let mut rooted = root;
        rooted.ancestry = vec![FolderId::new()];
        assert!(HierarchyAssembler::assemble(vec![rooted]).is_err());
    }

    #[test]
    fn test_empty_rows_give_empty_forest() {
        assert!(HierarchyAssembler::assemble(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_one_level_drops_placeholders_and_sorts() {
        let forest = HierarchyAssembler::assemble(sample()).unwrap();
        let mut root = forest[0].clone();
        let subfolders = std::mem::take(&mut root.folders).into_iter().rev().collect();
        let mut files = std::mem::take(&mut root.files);
        let mut placeholder = files[0].clone();
        placeholder.name = "0-marker".to_string();
        placeholder.is_dir = true;
        files.push(placeholder);

        let level = HierarchyAssembler::one_level(root, subfolders, files).unwrap();

        let names: Vec<&str> = level.folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["docs", "pics"]);
        assert_eq!(level.files.len(), 1);
        assert_eq!(level.files[0].name, "readme.txt");
    }
}
