//! Convenience result type aliases for NetDrive.

use crate::error::{AppError, DriveError};

/// A specialized `Result` type for collaborator and plumbing operations.
///
/// This is defined as a convenience so that every crate does not need to
/// write `Result<T, AppError>` explicitly.
pub type AppResult<T> = Result<T, AppError>;

/// Result type for the hierarchy, archive, and erase operations.
pub type DriveResult<T> = Result<T, DriveError>;
