//! Zip archive streaming for folder downloads.

pub mod builder;
pub mod naming;
pub mod stream;
mod writer;

pub use builder::ArchiveBuilder;
pub use naming::{EntryNamer, sanitize_component};
pub use stream::{ARCHIVE_CONTENT_TYPE, ArchiveStream};
