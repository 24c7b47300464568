//! # netdrive-storage
//!
//! Object store implementations for NetDrive (local filesystem,
//! S3-compatible services, and an in-memory store for tests) plus the
//! [`BulkEraser`] that removes everything under a key prefix.

pub mod eraser;
pub mod manager;
pub mod providers;

pub use eraser::{BulkEraser, ErasePhase, EraseOptions, EraseReport};
pub use manager::StorageManager;
