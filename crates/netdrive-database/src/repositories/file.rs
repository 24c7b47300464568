//! File repository implementation.

use sqlx::PgPool;

use netdrive_core::error::{AppError, ErrorKind};
use netdrive_core::result::AppResult;
use netdrive_core::types::{FileId, FolderId};
use netdrive_entity::file::{CreateFile, File};

const FILE_COLUMNS: &str = "id, name, path, size, folder_id, owner, uploaded_at, is_dir";

/// Repository for file CRUD and query operations.
#[derive(Debug, Clone)]
pub struct FileRepository {
    pool: PgPool,
}

impl FileRepository {
    /// Create a new file repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a file by ID.
    pub async fn find_by_id(&self, id: FileId) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>(&format!("SELECT {FILE_COLUMNS} FROM files WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find file", e))
    }

    /// List an owner's files, newest first. Placeholders are excluded.
    pub async fn find_by_owner(&self, owner: &str) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(&format!(
            "SELECT {FILE_COLUMNS} FROM files \
             WHERE owner = $1 AND is_dir = FALSE ORDER BY uploaded_at DESC, id ASC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list files", e))
    }

    /// List the files directly inside a folder. Placeholders are excluded.
    pub async fn find_by_folder(&self, folder_id: FolderId) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(&format!(
            "SELECT {FILE_COLUMNS} FROM files \
             WHERE folder_id = $1 AND is_dir = FALSE ORDER BY name ASC, id ASC"
        ))
        .bind(folder_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list folder files", e))
    }

    /// Create a new file record.
    pub async fn create(&self, data: &CreateFile) -> AppResult<File> {
        sqlx::query_as::<_, File>(&format!(
            "INSERT INTO files (id, name, path, size, folder_id, owner, is_dir) \
             VALUES ($1, $2, $3, $4, $5, $6, FALSE) RETURNING {FILE_COLUMNS}"
        ))
        .bind(data.id)
        .bind(&data.name)
        .bind(&data.storage_key)
        .bind(data.size)
        .bind(data.folder_id)
        .bind(&data.owner)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.constraint() == Some("files_path_key") => {
                AppError::conflict(format!("Storage key '{}' already in use", data.storage_key))
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create file", e),
        })
    }

    /// Delete a file record. Returns `true` if a row was removed.
    pub async fn delete(&self, id: FileId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete file", e))?;
        Ok(result.rows_affected() > 0)
    }
}
