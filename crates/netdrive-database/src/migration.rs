//! Schema migration runner for the folders and files tables.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

use netdrive_core::error::{AppError, ErrorKind};

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Apply every pending migration. Returns how many migrations are known.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, AppError> {
    let known = MIGRATOR.iter().count();
    info!(migrations = known, "Applying metadata schema migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to run migrations: {e}"),
            e,
        )
    })?;

    Ok(known)
}
