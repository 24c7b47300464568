//! The finished archive as an async readable, seekable stream.

use std::io::SeekFrom;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};
use tokio_util::io::ReaderStream;

use netdrive_core::traits::storage::ByteStream;

use super::writer::SpooledArchive;

/// MIME type of every archive produced here.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

pin_project! {
    /// A complete zip archive backed by an anonymous spool file.
    ///
    /// Reads start at the beginning of the archive. Dropping the stream
    /// closes and deletes the spool file.
    #[derive(Debug)]
    pub struct ArchiveStream {
        #[pin]
        file: tokio::fs::File,
        size: u64,
        entries: usize,
    }
}

impl ArchiveStream {
    pub(crate) fn from_spool(spool: SpooledArchive) -> Self {
        Self {
            file: tokio::fs::File::from_std(spool.file),
            size: spool.size,
            entries: spool.entries,
        }
    }

    /// Total archive size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of entries (files and directories) in the archive.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Always `application/zip`.
    pub fn content_type(&self) -> &'static str {
        ARCHIVE_CONTENT_TYPE
    }

    /// Convert into a chunked byte stream, e.g. for an HTTP body.
    pub fn into_byte_stream(self) -> ByteStream {
        Box::pin(ReaderStream::new(self))
    }
}

impl AsyncRead for ArchiveStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.project().file.poll_read(cx, buf)
    }
}

impl AsyncSeek for ArchiveStream {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> std::io::Result<()> {
        self.project().file.start_seek(position)
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<u64>> {
        self.project().file.poll_complete(cx)
    }
}
