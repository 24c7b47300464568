//! Archive streaming and bulk-erase tuning.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Concurrency and buffering limits for archive builds and prefix erases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Number of concurrent delete workers in a parallel erase.
    #[serde(default = "default_erase_workers")]
    pub erase_workers: usize,
    /// Capacity of the queue feeding keys to the delete workers.
    #[serde(default = "default_erase_queue_depth")]
    pub erase_queue_depth: usize,
    /// Maximum keys requested per listing page.
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
    /// Chunk size used when copying object content.
    #[serde(default = "default_copy_chunk_bytes")]
    pub copy_chunk_bytes: usize,
    /// Number of chunks buffered between the traversal and the archive writer.
    #[serde(default = "default_archive_channel_depth")]
    pub archive_channel_depth: usize,
}

impl TransferConfig {
    /// Reject limits that would stall the worker pool or the archive pipe.
    pub fn validate(&self) -> Result<(), AppError> {
        let zero = [
            ("erase_workers", self.erase_workers),
            ("erase_queue_depth", self.erase_queue_depth),
            ("list_page_size", self.list_page_size),
            ("copy_chunk_bytes", self.copy_chunk_bytes),
            ("archive_channel_depth", self.archive_channel_depth),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        match zero {
            Some((name, _)) => Err(AppError::configuration(format!(
                "transfer.{name} must be greater than zero"
            ))),
            None => Ok(()),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            erase_workers: default_erase_workers(),
            erase_queue_depth: default_erase_queue_depth(),
            list_page_size: default_list_page_size(),
            copy_chunk_bytes: default_copy_chunk_bytes(),
            archive_channel_depth: default_archive_channel_depth(),
        }
    }
}

fn default_erase_workers() -> usize {
    10
}

fn default_erase_queue_depth() -> usize {
    1000
}

fn default_list_page_size() -> usize {
    1000
}

fn default_copy_chunk_bytes() -> usize {
    64 * 1024
}

fn default_archive_channel_depth() -> usize {
    8
}
