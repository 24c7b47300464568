//! Core traits defined in `netdrive-core` and implemented by other crates.

pub mod storage;

pub use storage::{ObjectStore, PresignedUrls};
