//! Folder repository implementation.

use sqlx::PgPool;

use netdrive_core::error::{AppError, ErrorKind};
use netdrive_core::result::AppResult;
use netdrive_core::types::FolderId;
use netdrive_entity::folder::{CreateFolder, Folder, HierarchyRow, ROOT_FOLDER_NAME};

const FOLDER_COLUMNS: &str = "id, name, owner, parent_id, created_at, path_array";

/// Walks an owner's tree from the root. Rows come out parents-first
/// (`level` ascending), so every parent precedes its children.
const HIERARCHY_WITH_FILES: &str = "\
    WITH RECURSIVE tree AS ( \
        SELECT f.id, f.name, f.parent_id, f.owner, f.created_at, f.path_array, 0 AS level \
        FROM folders f WHERE f.owner = $1 AND f.parent_id IS NULL \
        UNION ALL \
        SELECT f.id, f.name, f.parent_id, f.owner, f.created_at, f.path_array, t.level + 1 \
        FROM folders f INNER JOIN tree t ON f.parent_id = t.id \
    ) \
    SELECT t.id AS folder_id, t.name, t.parent_id, t.owner, t.created_at, \
           t.path_array AS ancestry, \
           fl.id AS file_id, fl.name AS file_name, fl.path AS file_key, \
           fl.size AS file_size, fl.uploaded_at AS file_uploaded_at, fl.is_dir AS file_is_dir \
    FROM tree t LEFT JOIN files fl ON fl.folder_id = t.id \
    ORDER BY t.level ASC, t.path_array ASC, t.id ASC, fl.name ASC, fl.id ASC";

const HIERARCHY_FOLDERS_ONLY: &str = "\
    WITH RECURSIVE tree AS ( \
        SELECT f.id, f.name, f.parent_id, f.owner, f.created_at, f.path_array, 0 AS level \
        FROM folders f WHERE f.owner = $1 AND f.parent_id IS NULL \
        UNION ALL \
        SELECT f.id, f.name, f.parent_id, f.owner, f.created_at, f.path_array, t.level + 1 \
        FROM folders f INNER JOIN tree t ON f.parent_id = t.id \
    ) \
    SELECT t.id AS folder_id, t.name, t.parent_id, t.owner, t.created_at, \
           t.path_array AS ancestry, \
           NULL::uuid AS file_id, NULL::text AS file_name, NULL::text AS file_key, \
           NULL::bigint AS file_size, NULL::timestamptz AS file_uploaded_at, \
           NULL::boolean AS file_is_dir \
    FROM tree t \
    ORDER BY t.level ASC, t.path_array ASC, t.id ASC";

/// Repository for folder CRUD and tree queries.
#[derive(Debug, Clone)]
pub struct FolderRepository {
    pool: PgPool,
}

impl FolderRepository {
    /// Create a new folder repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a folder by ID.
    pub async fn find_by_id(&self, id: FolderId) -> AppResult<Option<Folder>> {
        sqlx::query_as::<_, Folder>(&format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find folder", e))
    }

    /// Find the root folder of an owner.
    pub async fn find_root(&self, owner: &str) -> AppResult<Option<Folder>> {
        sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE owner = $1 AND parent_id IS NULL"
        ))
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find root folder", e))
    }

    /// Create the owner's root folder, or return the existing one.
    pub async fn create_root(&self, owner: &str) -> AppResult<Folder> {
        sqlx::query(
            "INSERT INTO folders (id, name, owner, parent_id, path_array) \
             VALUES ($1, $2, $3, NULL, '{}') \
             ON CONFLICT (owner) WHERE parent_id IS NULL DO NOTHING",
        )
        .bind(FolderId::new())
        .bind(ROOT_FOLDER_NAME)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create root folder", e))?;

        self.find_root(owner)
            .await?
            .ok_or_else(|| AppError::internal(format!("Root folder for '{owner}' vanished")))
    }

    /// List direct subfolders of a folder, ordered by name.
    pub async fn find_children(&self, parent_id: FolderId) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE parent_id = $1 ORDER BY name ASC, id ASC"
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list children", e))
    }

    /// Flat rows of an owner's whole tree, parents before children.
    ///
    /// With `include_files` each folder is joined with its files, producing
    /// one row per file (fan-out); otherwise the file columns are null.
    pub async fn hierarchy_rows(
        &self,
        owner: &str,
        include_files: bool,
    ) -> AppResult<Vec<HierarchyRow>> {
        let query = if include_files {
            HIERARCHY_WITH_FILES
        } else {
            HIERARCHY_FOLDERS_ONLY
        };

        sqlx::query_as::<_, HierarchyRow>(query)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to load folder hierarchy", e)
            })
    }

    /// Create a non-root folder. The ancestry is derived from the parent row
    /// inside the same transaction.
    pub async fn create(&self, data: &CreateFolder) -> AppResult<Folder> {
        let parent_id = data
            .parent_id
            .ok_or_else(|| AppError::validation("Only the root folder may have no parent"))?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let parent = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE id = $1 FOR SHARE"
        ))
        .bind(parent_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load parent folder", e))?
        .ok_or_else(|| AppError::not_found(format!("Parent folder {parent_id} not found")))?;

        if parent.owner != data.owner {
            return Err(AppError::authorization(format!(
                "Folder {parent_id} does not belong to '{}'",
                data.owner
            )));
        }

        let folder = sqlx::query_as::<_, Folder>(&format!(
            "INSERT INTO folders (id, name, owner, parent_id, path_array) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {FOLDER_COLUMNS}"
        ))
        .bind(FolderId::new())
        .bind(&data.name)
        .bind(&data.owner)
        .bind(parent_id)
        .bind(parent.child_ancestry())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create folder", e))?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit folder creation", e)
        })?;

        Ok(folder)
    }

    /// Delete a set of folders and every file row inside them, atomically.
    ///
    /// Returns `(files_deleted, folders_deleted)`.
    pub async fn delete_tree(&self, folder_ids: &[FolderId]) -> AppResult<(u64, u64)> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let files = sqlx::query("DELETE FROM files WHERE folder_id = ANY($1)")
            .bind(folder_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete files", e))?
            .rows_affected();

        let folders = sqlx::query("DELETE FROM folders WHERE id = ANY($1)")
            .bind(folder_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete folders", e)
            })?
            .rows_affected();

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit folder deletion", e)
        })?;

        Ok((files, folders))
    }
}
