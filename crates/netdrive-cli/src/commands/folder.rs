//! Folder CLI commands: tree, ls, mkdir, download-folder, rm-folder.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use crate::output::{self, OutputFormat};
use netdrive_core::config::AppConfig;
use netdrive_core::error::AppError;
use netdrive_entity::folder::Folder;

/// Arguments for `tree`
#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Owner whose hierarchy to print
    #[arg(short, long)]
    pub owner: String,

    /// Skip files and print folders only
    #[arg(long)]
    pub folders_only: bool,
}

/// Arguments for `ls`
#[derive(Debug, Args)]
pub struct LsArgs {
    /// Owner of the folder
    #[arg(short, long)]
    pub owner: String,

    /// Folder ID (defaults to the owner's root folder)
    pub folder_id: Option<String>,
}

/// Arguments for `mkdir`
#[derive(Debug, Args)]
pub struct MkdirArgs {
    /// Owner of the new folder
    #[arg(short, long)]
    pub owner: String,

    /// Folder name
    pub name: String,

    /// Parent folder ID (defaults to the owner's root folder)
    #[arg(short, long)]
    pub parent_id: Option<String>,
}

/// Arguments for `download-folder`
#[derive(Debug, Args)]
pub struct DownloadFolderArgs {
    /// Owner of the folder
    #[arg(short, long)]
    pub owner: String,

    /// Folder ID to archive
    pub folder_id: String,

    /// Output path (defaults to `<folder name>.zip` in the current directory)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Arguments for `rm-folder`
#[derive(Debug, Args)]
pub struct RmFolderArgs {
    /// Owner of the folder
    #[arg(short, long)]
    pub owner: String,

    /// Folder ID to delete
    pub folder_id: String,
}

/// One entry of a folder listing
#[derive(Debug, Serialize, Tabled)]
struct EntryRow {
    /// Entry kind
    kind: &'static str,
    /// Entry ID
    id: String,
    /// Name
    name: String,
    /// Size in bytes (files only)
    size: String,
    /// Created or uploaded at
    date: String,
}

fn entry_rows(folder: &Folder) -> Vec<EntryRow> {
    let folders = folder.folders.iter().map(|f| EntryRow {
        kind: "dir",
        id: f.id.to_string(),
        name: f.name.clone(),
        size: String::new(),
        date: f.created_at.format("%Y-%m-%d %H:%M").to_string(),
    });
    let files = folder.files.iter().map(|f| EntryRow {
        kind: "file",
        id: f.id.to_string(),
        name: f.name.clone(),
        size: f.size.to_string(),
        date: f.uploaded_at.format("%Y-%m-%d %H:%M").to_string(),
    });
    folders.chain(files).collect()
}

/// Execute `tree`
pub async fn tree(args: &TreeArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let drive = super::drive_service(config).await?;
    let forest = if args.folders_only {
        drive.assemble_folder_hierarchy(&args.owner).await?
    } else {
        drive.assemble_full_hierarchy(&args.owner).await?
    };

    if forest.is_empty() && format == OutputFormat::Table {
        println!("No folders for '{}'.", args.owner);
    } else {
        output::print_tree(&forest, format);
    }
    Ok(())
}

/// Execute `ls`
pub async fn ls(args: &LsArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let drive = super::drive_service(config).await?;
    let folder_id = match &args.folder_id {
        Some(raw) => super::parse_folder_id(raw)?,
        None => drive.get_root_folder(&args.owner).await?.id,
    };

    let folder = drive.folder_content(&args.owner, folder_id).await?;
    output::print_list(&entry_rows(&folder), format);
    Ok(())
}

/// Execute `mkdir`
pub async fn mkdir(args: &MkdirArgs, config: &AppConfig) -> Result<(), AppError> {
    let drive = super::drive_service(config).await?;
    let parent_id = args
        .parent_id
        .as_deref()
        .map(super::parse_folder_id)
        .transpose()?;

    let folder = drive.create_folder(&args.owner, &args.name, parent_id).await?;
    output::print_success(&format!("Folder '{}' created (id: {})", folder.name, folder.id));
    Ok(())
}

/// Execute `download-folder`
pub async fn download(
    args: &DownloadFolderArgs,
    config: &AppConfig,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    let drive = super::drive_service(config).await?;
    let folder_id = super::parse_folder_id(&args.folder_id)?;

    let mut named = drive.download_folder(&args.owner, folder_id, cancel).await?;
    let path = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&named.file_name));

    let mut out = tokio::fs::File::create(&path).await?;
    let written = tokio::io::copy(&mut named.archive, &mut out).await?;
    out.sync_all().await?;

    output::print_success(&format!(
        "Wrote {} ({} entries, {written} bytes)",
        path.display(),
        named.archive.entries()
    ));
    Ok(())
}

/// Execute `rm-folder`
pub async fn remove(
    args: &RmFolderArgs,
    config: &AppConfig,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    let drive = super::drive_service(config).await?;
    let folder_id = super::parse_folder_id(&args.folder_id)?;

    let deletion = drive.delete_folder(&args.owner, folder_id, cancel).await?;
    output::print_success(&format!("Folder {folder_id} deleted"));
    output::print_kv("Folders removed", &deletion.folders.to_string());
    output::print_kv("Files removed", &deletion.files.to_string());
    output::print_kv("Objects erased", &deletion.objects.to_string());
    Ok(())
}
