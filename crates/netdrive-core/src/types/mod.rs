//! Core type definitions used across the NetDrive workspace.

pub mod id;

pub use id::*;
