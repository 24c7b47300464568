//! Unified error types for NetDrive.
//!
//! Collaborator failures (database, object store, configuration) are carried
//! as [`AppError`]. The hierarchy, archive, and erase operations report their
//! own failure modes through [`DriveError`], which maps back into `AppError`
//! at the application boundary.

use std::fmt;

use thiserror::Error;

use crate::types::{FileId, FolderId};

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested resource was not found.
    NotFound,
    /// The caller does not own the resource.
    Authorization,
    /// Input validation failed.
    Validation,
    /// A conflict occurred (non-empty prefix, duplicate entry, etc.).
    Conflict,
    /// An internal error occurred.
    Internal,
    /// A database error occurred.
    Database,
    /// An object store I/O error occurred.
    Storage,
    /// Persisted data violates a structural invariant.
    CorruptData,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// The requested capability is not available on this backend.
    NotImplemented,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Database => write!(f, "DATABASE"),
            Self::Storage => write!(f, "STORAGE"),
            Self::CorruptData => write!(f, "CORRUPT_DATA"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::NotImplemented => write!(f, "NOT_IMPLEMENTED"),
        }
    }
}

/// The unified application error used throughout NetDrive.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a not-implemented error.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, message)
    }

    /// Whether this error means the addressed resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Storage, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

/// One key that could not be deleted during a bulk erase.
#[derive(Debug, Clone)]
pub struct DeletionFailure {
    /// The object key that failed.
    pub key: String,
    /// The error reported by the object store.
    pub cause: AppError,
}

impl fmt::Display for DeletionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.cause)
    }
}

/// Failure modes of the hierarchy, archive, and erase operations.
#[derive(Debug, Error)]
pub enum DriveError {
    /// Flat hierarchy rows violate the ordering or parent-reference contract.
    #[error("Corrupt folder hierarchy at folder {folder_id}: {reason}")]
    CorruptHierarchy {
        /// The folder whose row exposed the inconsistency.
        folder_id: FolderId,
        /// What was wrong with it.
        reason: String,
    },

    /// Metadata references content that the object store does not have.
    #[error("Content of file {file_id} is missing from the object store (key '{key}')")]
    ObjectNotFound {
        /// The file whose content is missing.
        file_id: FileId,
        /// The storage key that was opened.
        key: String,
    },

    /// One or more deletions failed during a bulk erase.
    #[error(
        "{count} of {attempted} deletions under '{prefix}' failed: {summary}",
        count = .failures.len(),
        summary = summarize(.failures)
    )]
    AggregatedDeletion {
        /// The prefix being erased.
        prefix: String,
        /// How many deletions were dispatched.
        attempted: usize,
        /// Every key that failed, with its cause.
        failures: Vec<DeletionFailure>,
    },

    /// A safe erase found objects still present under the prefix.
    #[error("Prefix '{prefix}' is not empty ({remaining} object(s) remain)")]
    PrefixNotEmpty {
        /// The prefix that was checked.
        prefix: String,
        /// Number of objects seen by the emptiness check.
        remaining: usize,
    },

    /// The operation was aborted through its cancellation token.
    #[error("{operation} was cancelled")]
    Cancelled {
        /// Name of the aborted operation.
        operation: &'static str,
    },

    /// A collaborator (database, object store, configuration) failed.
    #[error(transparent)]
    App(#[from] AppError),
}

impl DriveError {
    /// Shorthand for a corrupt-hierarchy error.
    pub fn corrupt(folder_id: FolderId, reason: impl Into<String>) -> Self {
        Self::CorruptHierarchy {
            folder_id,
            reason: reason.into(),
        }
    }

    /// The [`ErrorKind`] this error maps to at the application boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CorruptHierarchy { .. } => ErrorKind::CorruptData,
            Self::ObjectNotFound { .. } => ErrorKind::NotFound,
            Self::AggregatedDeletion { .. } => ErrorKind::Storage,
            Self::PrefixNotEmpty { .. } => ErrorKind::Conflict,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::App(e) => e.kind,
        }
    }

    /// Keys that failed in an aggregated deletion error; empty otherwise.
    pub fn failed_keys(&self) -> Vec<&str> {
        match self {
            Self::AggregatedDeletion { failures, .. } => {
                failures.iter().map(|f| f.key.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl From<DriveError> for AppError {
    fn from(err: DriveError) -> Self {
        match err {
            DriveError::App(inner) => inner,
            other => {
                let kind = other.kind();
                let message = other.to_string();
                AppError::with_source(kind, message, other)
            }
        }
    }
}

fn summarize(failures: &[DeletionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregated_message_lists_every_key() {
        let err = DriveError::AggregatedDeletion {
            prefix: "alice/".into(),
            attempted: 5,
            failures: vec![
                DeletionFailure {
                    key: "alice/a".into(),
                    cause: AppError::storage("timeout"),
                },
                DeletionFailure {
                    key: "alice/b".into(),
                    cause: AppError::storage("reset"),
                },
            ],
        };

        let msg = err.to_string();
        assert!(msg.starts_with("2 of 5 deletions under 'alice/' failed"));
        assert!(msg.contains("alice/a (STORAGE: timeout)"));
        assert!(msg.contains("alice/b (STORAGE: reset)"));
        assert_eq!(err.failed_keys(), vec!["alice/a", "alice/b"]);
    }

    #[test]
    fn test_drive_error_maps_to_app_error_kind() {
        let app: AppError = DriveError::PrefixNotEmpty {
            prefix: "bob/".into(),
            remaining: 1,
        }
        .into();
        assert_eq!(app.kind, ErrorKind::Conflict);

        let app: AppError = DriveError::Cancelled {
            operation: "bulk erase",
        }
        .into();
        assert_eq!(app.kind, ErrorKind::Cancelled);
        assert_eq!(app.message, "bulk erase was cancelled");
    }

    #[test]
    fn test_wrapped_app_error_is_unwrapped() {
        let app: AppError = DriveError::from(AppError::database("down")).into();
        assert_eq!(app.kind, ErrorKind::Database);
        assert!(app.source.is_none());
    }
}
