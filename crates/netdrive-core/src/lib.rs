//! # netdrive-core
//!
//! Core crate for NetDrive. Contains the object-store trait, configuration
//! schemas, typed identifiers, and the unified error system.
//!
//! This crate has **no** internal dependencies on other NetDrive crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, DriveError};
pub use result::{AppResult, DriveResult};
