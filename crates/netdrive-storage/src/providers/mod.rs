//! Object store implementations.

pub mod local;
#[cfg(any(test, feature = "mock"))]
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

pub use local::LocalObjectStore;
#[cfg(any(test, feature = "mock"))]
pub use memory::MemoryObjectStore;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;
