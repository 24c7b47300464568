//! Archive pipeline errors.
//!
//! Failures inside the archive writer are collected in [`ArchiveError`] and
//! surface to callers as [`DriveError`].

use netdrive_core::error::{AppError, DriveError, ErrorKind};
use thiserror::Error;

/// Errors raised while spooling a zip archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Spool file I/O failed.
    #[error("Archive spool I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip encoder rejected an entry or failed to finalize.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The blocking writer task panicked or was cancelled by the runtime.
    #[error("Archive writer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The producer stopped without finishing the archive.
    #[error("Archive build aborted before completion")]
    Aborted,
}

impl From<ArchiveError> for DriveError {
    fn from(err: ArchiveError) -> Self {
        let kind = match &err {
            ArchiveError::Io(_) => ErrorKind::Storage,
            ArchiveError::Zip(_) | ArchiveError::Join(_) | ArchiveError::Aborted => {
                ErrorKind::Internal
            }
        };
        let message = err.to_string();
        DriveError::App(AppError::with_source(kind, message, err))
    }
}
