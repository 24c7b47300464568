//! Database migration management commands.

use clap::{Args, Subcommand};

use crate::output;
use netdrive_core::config::AppConfig;
use netdrive_core::error::AppError;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations
    Run,
    /// Check database connectivity
    Check,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config: &AppConfig) -> Result<(), AppError> {
    let db = super::connect_db(config).await?;

    match &args.command {
        MigrateCommand::Run => {
            println!("Running database migrations...");
            let known = netdrive_database::migration::run_migrations(db.pool()).await?;
            output::print_success(&format!("Migrations applied ({known} known)."));
        }
        MigrateCommand::Check => {
            if db.health_check().await? {
                output::print_success("Database is reachable.");
            } else {
                return Err(AppError::database("Database health check failed"));
            }
        }
    }

    db.close().await;
    Ok(())
}
