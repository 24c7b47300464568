//! # netdrive-database
//!
//! PostgreSQL connection management, migrations, and the repositories that
//! back the [`MetadataStore`] seam used by the drive service.

pub mod connection;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use store::{MetadataStore, PgMetadataStore};
