//! Folder domain entities.

pub mod model;
pub mod row;

pub use model::{CreateFolder, Folder, ROOT_FOLDER_NAME};
pub use row::HierarchyRow;
