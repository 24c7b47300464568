//! File CLI commands: upload and presigned URLs.

use std::path::PathBuf;

use clap::Args;
use tokio_util::io::ReaderStream;

use crate::output;
use netdrive_core::config::AppConfig;
use netdrive_core::error::AppError;
use netdrive_core::traits::storage::ByteStream;

/// Arguments for the upload command
#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Path to the file to upload
    pub file: PathBuf,

    /// Owner of the uploaded file
    #[arg(short, long)]
    pub owner: String,

    /// Target folder ID (defaults to the owner's root folder)
    #[arg(short, long)]
    pub folder_id: Option<String>,

    /// Override file name
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Arguments for the url command
#[derive(Debug, Args)]
pub struct UrlArgs {
    /// File ID
    pub file_id: String,
}

/// Execute the upload command
pub async fn upload(args: &UploadArgs, config: &AppConfig) -> Result<(), AppError> {
    let file_name = args.name.clone().unwrap_or_else(|| {
        args.file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string()
    });

    let local = tokio::fs::File::open(&args.file).await.map_err(|e| {
        AppError::not_found(format!("Cannot open {}: {e}", args.file.display()))
    })?;
    let folder_id = args
        .folder_id
        .as_deref()
        .map(super::parse_folder_id)
        .transpose()?;

    let drive = super::drive_service(config).await?;
    let content: ByteStream = Box::pin(ReaderStream::new(local));
    let file = drive
        .upload_file(&args.owner, &file_name, content, folder_id)
        .await?;

    output::print_success(&format!(
        "File '{}' uploaded (id: {}, size: {} bytes)",
        file.name, file.id, file.size
    ));
    Ok(())
}

/// Execute the url command
pub async fn url(args: &UrlArgs, config: &AppConfig) -> Result<(), AppError> {
    let file_id = super::parse_file_id(&args.file_id)?;
    let drive = super::drive_service(config).await?;
    println!("{}", drive.file_download_url(file_id).await?);
    Ok(())
}
