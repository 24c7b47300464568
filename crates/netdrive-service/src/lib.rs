//! # netdrive-service
//!
//! Application layer for NetDrive. Turns flat metadata rows into folder
//! trees, streams subtrees into zip archives, and exposes the
//! [`DriveService`] façade that the CLI (and any future front end) calls.
//!
//! Dependencies are injected at construction: the metadata store as an
//! `Arc<dyn MetadataStore>` and the object store through a
//! [`StorageManager`](netdrive_storage::StorageManager).

pub mod archive;
pub mod drive;
pub mod error;
pub mod folder;

pub use archive::{ArchiveBuilder, ArchiveStream};
pub use drive::{DriveService, FolderDeletion, NamedArchive};
pub use error::ArchiveError;
pub use folder::HierarchyAssembler;
