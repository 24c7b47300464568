//! Blocking zip sink fed through a bounded channel.
//!
//! The sink owns the only [`ZipWriter`] and an anonymous spool file. It runs
//! on a blocking thread and applies commands in arrival order. If the
//! channel closes before [`ArchiveCommand::Finish`], the build is abandoned
//! and the spool file is dropped, which deletes it.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

use bytes::Bytes;
use tokio::sync::mpsc;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::error::ArchiveError;

/// One step of the archive build.
#[derive(Debug)]
pub(crate) enum ArchiveCommand {
    /// Add a directory entry (path ends in `/`).
    Directory(String),
    /// Start a file entry; following chunks belong to it.
    StartFile { path: String, size: u64 },
    /// Content for the current file entry.
    Chunk(Bytes),
    /// Write the central directory and hand back the spool.
    Finish,
}

/// A finished archive waiting in its spool file, rewound to the start.
#[derive(Debug)]
pub(crate) struct SpooledArchive {
    pub file: File,
    pub size: u64,
    pub entries: usize,
}

/// Run the sink until `Finish` or until the producer goes away.
pub(crate) fn run_writer(
    mut commands: mpsc::Receiver<ArchiveCommand>,
) -> Result<SpooledArchive, ArchiveError> {
    let mut zip = ZipWriter::new(tempfile::tempfile()?);
    let mut entries = 0usize;

    while let Some(command) = commands.blocking_recv() {
        match command {
            ArchiveCommand::Directory(path) => {
                zip.add_directory(path, directory_options())?;
                entries += 1;
            }
            ArchiveCommand::StartFile { path, size } => {
                zip.start_file(path, file_options(size))?;
                entries += 1;
            }
            ArchiveCommand::Chunk(bytes) => zip.write_all(&bytes)?,
            ArchiveCommand::Finish => {
                let mut file = zip.finish()?;
                file.flush()?;
                let size = file.seek(SeekFrom::End(0))?;
                file.seek(SeekFrom::Start(0))?;
                return Ok(SpooledArchive {
                    file,
                    size,
                    entries,
                });
            }
        }
    }

    Err(ArchiveError::Aborted)
}

fn directory_options() -> SimpleFileOptions {
    SimpleFileOptions::default().unix_permissions(0o755)
}

fn file_options(size: u64) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644)
        .large_file(size >= u64::from(u32::MAX))
}
