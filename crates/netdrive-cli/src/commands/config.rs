//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use netdrive_core::config::AppConfig;
use netdrive_core::error::AppError;
use netdrive_database::connection::mask_password;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration with secrets masked
    Show,
    /// Validate the configuration and summarize it
    Validate,
    /// Write the default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config/generated.toml")]
        output: String,
    },
}

/// Execute config commands
pub fn execute(
    args: &ConfigArgs,
    config: &AppConfig,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let masked = redacted(config);
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&masked)?);
                }
                OutputFormat::Table => println!("{masked:#?}"),
            }
        }
        ConfigCommand::Validate => {
            output::print_success(&format!("Configuration '{config_path}' is valid"));
            output::print_kv("Database", &mask_password(&config.database.url));
            output::print_kv("Storage", &format!("{:?}", config.storage.provider));
            output::print_kv("Erase workers", &config.transfer.erase_workers.to_string());
            output::print_kv("Log level", &config.logging.level);
        }
        ConfigCommand::Generate { output: out_path } => {
            let default_config = include_str!("../../../../config/default.toml");

            if let Some(parent) = std::path::Path::new(out_path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out_path, default_config)?;

            output::print_success(&format!("Default config written to '{out_path}'"));
        }
    }

    Ok(())
}

fn redacted(config: &AppConfig) -> AppConfig {
    let mut masked = config.clone();
    masked.database.url = mask_password(&masked.database.url);
    if !masked.storage.s3.secret_key.is_empty() {
        masked.storage.s3.secret_key = "****".to_string();
    }
    masked
}
