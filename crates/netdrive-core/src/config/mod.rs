//! Application configuration schemas.
//!
//! All configuration structs are deserialized from a TOML file via the
//! `config` crate, overlaid with `NETDRIVE__`-prefixed environment
//! variables. Each sub-module represents a logical configuration section.

pub mod database;
pub mod logging;
pub mod storage;
pub mod transfer;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::storage::{LocalStorageConfig, ProviderKind, S3StorageConfig, StorageConfig};
pub use self::transfer::TransferConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Metadata database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Object store settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Archive and bulk-erase tuning.
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// The file is optional; every field has a default and any value can be
    /// overridden with environment variables such as
    /// `NETDRIVE__TRANSFER__ERASE_WORKERS=16`.
    pub fn load(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("NETDRIVE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        parsed.transfer.validate()?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_load_applies_defaults_for_missing_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[storage]\nprovider = \"s3\"\n\n[storage.s3]\nbucket = \"drive\"\n\n[transfer]\nerase_workers = 4"
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.storage.provider, ProviderKind::S3);
        assert_eq!(config.storage.s3.bucket, "drive");
        assert_eq!(config.storage.s3.region, "us-east-1");
        assert_eq!(config.transfer.erase_workers, 4);
        assert_eq!(config.transfer.erase_queue_depth, 1000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_rejects_zero_workers() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[transfer]\nerase_workers = 0").unwrap();

        let err = AppConfig::load(file.path().to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
    }
}
