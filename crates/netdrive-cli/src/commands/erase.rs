//! Bulk erase CLI command.

use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::output;
use netdrive_core::config::AppConfig;
use netdrive_core::error::{AppError, DriveError};
use netdrive_storage::EraseOptions;

/// Arguments for the erase command
#[derive(Debug, Args)]
pub struct EraseArgs {
    /// Storage prefix, e.g. `alice/<folder-id>`
    pub prefix: String,

    /// Delete one key at a time instead of through the worker pool
    #[arg(long)]
    pub sequential: bool,

    /// Only remove the prefix's directory marker, and only if it is empty
    #[arg(long)]
    pub safe: bool,
}

/// Execute the erase command
pub async fn execute(
    args: &EraseArgs,
    config: &AppConfig,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    let storage = super::connect_storage(config).await?;
    let options = EraseOptions {
        parallel: !args.sequential,
        safe: args.safe,
    };

    match storage.eraser().erase(&args.prefix, options, cancel).await {
        Ok(report) => {
            output::print_success(&format!(
                "Erased {} of {} objects under '{}'",
                report.deleted, report.attempted, report.prefix
            ));
            Ok(())
        }
        Err(DriveError::AggregatedDeletion {
            prefix,
            attempted,
            failures,
        }) => {
            for failure in &failures {
                output::print_error(&failure.to_string());
            }
            Err(AppError::storage(format!(
                "{} of {attempted} deletions under '{prefix}' failed",
                failures.len()
            )))
        }
        Err(other) => Err(other.into()),
    }
}
