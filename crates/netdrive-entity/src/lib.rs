//! # netdrive-entity
//!
//! Domain entity models for NetDrive. Every struct in this crate represents
//! a database table row, a query projection, or a domain value object. All
//! entities derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and
//! database entities additionally derive `sqlx::FromRow`.

pub mod file;
pub mod folder;

pub use file::{CreateFile, File};
pub use folder::{CreateFolder, Folder, HierarchyRow, ROOT_FOLDER_NAME};
