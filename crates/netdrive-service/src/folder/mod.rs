//! Folder tree assembly.

pub mod tree;

pub use tree::HierarchyAssembler;
