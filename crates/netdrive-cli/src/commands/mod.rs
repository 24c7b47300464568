//! CLI command definitions and dispatch.

pub mod config;
pub mod erase;
pub mod file;
pub mod folder;
pub mod migrate;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::output::OutputFormat;
use netdrive_core::config::AppConfig;
use netdrive_core::error::AppError;
use netdrive_core::types::{FileId, FolderId};
use netdrive_database::{DatabasePool, MetadataStore};
use netdrive_service::DriveService;
use netdrive_storage::StorageManager;

/// NetDrive administration CLI
#[derive(Debug, Parser)]
#[command(name = "netdrive", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print an owner's folder tree
    Tree(folder::TreeArgs),
    /// List one folder's direct contents
    Ls(folder::LsArgs),
    /// Create a folder
    Mkdir(folder::MkdirArgs),
    /// Upload a local file
    Upload(file::UploadArgs),
    /// Download a folder subtree as a zip archive
    DownloadFolder(folder::DownloadFolderArgs),
    /// Delete a folder, its descendants, and their content
    RmFolder(folder::RmFolderArgs),
    /// Delete every object under a storage prefix
    Erase(erase::EraseArgs),
    /// Print a presigned download URL for a file
    Url(file::UrlArgs),
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(
        &self,
        app_config: AppConfig,
        cancel: &CancellationToken,
    ) -> Result<(), AppError> {
        let config = &app_config;
        match &self.command {
            Commands::Tree(args) => folder::tree(args, config, self.format).await,
            Commands::Ls(args) => folder::ls(args, config, self.format).await,
            Commands::Mkdir(args) => folder::mkdir(args, config).await,
            Commands::Upload(args) => file::upload(args, config).await,
            Commands::DownloadFolder(args) => folder::download(args, config, cancel).await,
            Commands::RmFolder(args) => folder::remove(args, config, cancel).await,
            Commands::Erase(args) => erase::execute(args, config, cancel).await,
            Commands::Url(args) => file::url(args, config).await,
            Commands::Migrate(args) => migrate::execute(args, config).await,
            Commands::Config(args) => self::config::execute(args, config, &self.config, self.format),
        }
    }
}

/// Helper: load configuration from file and `NETDRIVE__` environment overrides
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
}

/// Helper: connect to the database
pub async fn connect_db(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}

/// Helper: build the configured object store
pub async fn connect_storage(config: &AppConfig) -> Result<StorageManager, AppError> {
    let storage = StorageManager::from_config(&config.storage, &config.transfer).await?;
    storage.require_healthy().await?;
    Ok(storage)
}

/// Helper: wire a drive service from configuration
pub async fn drive_service(config: &AppConfig) -> Result<DriveService, AppError> {
    let db = connect_db(config).await?;
    let storage = connect_storage(config).await?;
    let metadata: Arc<dyn MetadataStore> = Arc::new(db.metadata_store());
    Ok(DriveService::new(metadata, &storage))
}

/// Helper: parse a folder ID argument
pub fn parse_folder_id(raw: &str) -> Result<FolderId, AppError> {
    raw.parse()
        .map_err(|e| AppError::validation(format!("Invalid folder ID '{raw}': {e}")))
}

/// Helper: parse a file ID argument
pub fn parse_file_id(raw: &str) -> Result<FileId, AppError> {
    raw.parse()
        .map_err(|e| AppError::validation(format!("Invalid file ID '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_erase_flags_parse() {
        let cli = Cli::try_parse_from(["netdrive", "erase", "alice/f1", "--safe"]).unwrap();
        match cli.command {
            Commands::Erase(args) => {
                assert_eq!(args.prefix, "alice/f1");
                assert!(args.safe);
                assert!(!args.sequential);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert!(parse_folder_id("not-a-uuid").is_err());
        assert!(parse_file_id("").is_err());
    }
}
