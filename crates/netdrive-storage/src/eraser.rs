//! Bulk erasure of every object under a key prefix.
//!
//! The parallel mode runs a single producer that drains the paginated
//! listing into a bounded queue, a fixed pool of workers that each issue one
//! delete per key, and a coordinator that collects one outcome per
//! dispatched key from a results channel. Nothing is retried; failed keys
//! are reported together in [`DriveError::AggregatedDeletion`].

use std::fmt;
use std::sync::Arc;

use futures::TryStreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use netdrive_core::error::{AppError, DeletionFailure, DriveError};
use netdrive_core::result::{AppResult, DriveResult};
use netdrive_core::traits::storage::ObjectStore;

const OPERATION: &str = "bulk erase";

/// How an erase should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseOptions {
    /// Delete through the worker pool instead of one key at a time.
    pub parallel: bool,
    /// Only remove the prefix's directory marker, and only if nothing else
    /// remains under the prefix.
    pub safe: bool,
}

impl Default for EraseOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            safe: false,
        }
    }
}

/// Lifecycle of a single erase invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErasePhase {
    Listing,
    Dispatching,
    AwaitingResults,
    Succeeded,
    PartiallyFailed,
    Cancelled,
}

impl fmt::Display for ErasePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Listing => "listing",
            Self::Dispatching => "dispatching",
            Self::AwaitingResults => "awaiting_results",
            Self::Succeeded => "succeeded",
            Self::PartiallyFailed => "partially_failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Summary of a successful erase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EraseReport {
    /// The normalized prefix (always ends in `/`).
    pub prefix: String,
    /// Number of deletions issued.
    pub attempted: usize,
    /// Number of deletions that succeeded.
    pub deleted: usize,
}

/// Deletes every object under a prefix with bounded parallelism.
#[derive(Debug, Clone)]
pub struct BulkEraser {
    store: Arc<dyn ObjectStore>,
    workers: usize,
    queue_depth: usize,
}

/// What the producer task saw before it stopped.
enum ProducerOutcome {
    Exhausted { dispatched: usize },
    Cancelled { dispatched: usize },
    ListingFailed { dispatched: usize, error: AppError },
}

impl ProducerOutcome {
    fn dispatched(&self) -> usize {
        match self {
            Self::Exhausted { dispatched }
            | Self::Cancelled { dispatched }
            | Self::ListingFailed { dispatched, .. } => *dispatched,
        }
    }
}

/// One worker's report for one dispatched key.
enum DeleteOutcome {
    Deleted,
    Failed(DeletionFailure),
    Skipped,
}

impl BulkEraser {
    /// Create an eraser. Zero limits are raised to one.
    pub fn new(store: Arc<dyn ObjectStore>, workers: usize, queue_depth: usize) -> Self {
        Self {
            store,
            workers: workers.max(1),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Delete every object whose key starts with `prefix`.
    ///
    /// The prefix is normalized to end in `/`; an empty prefix is rejected.
    /// Deleting a key that is already gone counts as success.
    #[instrument(skip(self, cancel), fields(parallel = options.parallel, safe = options.safe))]
    pub async fn erase(
        &self,
        prefix: &str,
        options: EraseOptions,
        cancel: &CancellationToken,
    ) -> DriveResult<EraseReport> {
        let prefix = normalize_prefix(prefix)?;

        if options.safe {
            self.erase_marker(prefix, cancel).await
        } else if options.parallel {
            self.erase_parallel(prefix, cancel).await
        } else {
            self.erase_sequential(prefix, cancel).await
        }
    }

    async fn erase_parallel(
        &self,
        prefix: String,
        cancel: &CancellationToken,
    ) -> DriveResult<EraseReport> {
        debug!(phase = %ErasePhase::Listing, %prefix, workers = self.workers, "Erase started");

        let (key_tx, key_rx) = mpsc::channel::<String>(self.queue_depth);
        let key_rx = Arc::new(Mutex::new(key_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<(String, DeleteOutcome)>(self.queue_depth);

        let producer = self.spawn_producer(prefix.clone(), key_tx, cancel.clone());

        let workers: Vec<JoinHandle<()>> = (0..self.workers)
            .map(|_| {
                let store = Arc::clone(&self.store);
                let key_rx = Arc::clone(&key_rx);
                let result_tx = result_tx.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    loop {
                        let next = key_rx.lock().await.recv().await;
                        let Some(key) = next else {
                            break;
                        };
                        let outcome = if cancel.is_cancelled() {
                            DeleteOutcome::Skipped
                        } else {
                            match store.delete(&key).await {
                                Ok(()) => DeleteOutcome::Deleted,
                                Err(cause) => DeleteOutcome::Failed(DeletionFailure {
                                    key: key.clone(),
                                    cause,
                                }),
                            }
                        };
                        if result_tx.send((key, outcome)).await.is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(result_tx);

        // Results close once the producer has dropped the key queue and every
        // worker has drained it.
        let mut deleted = 0usize;
        let mut skipped = 0usize;
        let mut failures = Vec::new();
        while let Some((key, outcome)) = result_rx.recv().await {
            match outcome {
                DeleteOutcome::Deleted => deleted += 1,
                DeleteOutcome::Skipped => skipped += 1,
                DeleteOutcome::Failed(failure) => {
                    warn!(%key, error = %failure.cause, "Delete failed");
                    failures.push(failure);
                }
            }
        }

        let producer = producer
            .await
            .map_err(|e| AppError::internal(format!("Erase producer task failed: {e}")))?;
        for worker in futures::future::join_all(workers).await {
            worker.map_err(|e| AppError::internal(format!("Erase worker task failed: {e}")))?;
        }

        let attempted = producer.dispatched();
        debug!(
            phase = %ErasePhase::AwaitingResults,
            attempted,
            deleted,
            skipped,
            failed = failures.len(),
            "All dispatched deletions reported"
        );

        match producer {
            ProducerOutcome::Cancelled { .. } => {
                return Err(self.cancelled(&prefix, deleted));
            }
            ProducerOutcome::ListingFailed { error, .. } => {
                return Err(listing_failed(prefix, attempted, deleted, failures, error));
            }
            ProducerOutcome::Exhausted { .. } if skipped > 0 || cancel.is_cancelled() => {
                return Err(self.cancelled(&prefix, deleted));
            }
            ProducerOutcome::Exhausted { .. } => {}
        }

        finish(prefix, attempted, deleted, failures)
    }

    /// Spawn the task that drains the listing into the key queue. Dropping
    /// the sender on return closes the queue for the workers.
    fn spawn_producer(
        &self,
        prefix: String,
        key_tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> JoinHandle<ProducerOutcome> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let mut listing = store.list_by_prefix(&prefix);
            let mut dispatched = 0usize;

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return ProducerOutcome::Cancelled { dispatched },
                    next = listing.try_next() => next,
                };

                let key = match next {
                    Ok(Some(meta)) => meta.key,
                    Ok(None) => return ProducerOutcome::Exhausted { dispatched },
                    Err(error) => return ProducerOutcome::ListingFailed { dispatched, error },
                };

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return ProducerOutcome::Cancelled { dispatched },
                    sent = key_tx.send(key) => {
                        if sent.is_err() {
                            return ProducerOutcome::Exhausted { dispatched };
                        }
                    }
                }

                if dispatched == 0 {
                    debug!(phase = %ErasePhase::Dispatching, %prefix, "First key dispatched");
                }
                dispatched += 1;
            }
        })
    }

    async fn erase_sequential(
        &self,
        prefix: String,
        cancel: &CancellationToken,
    ) -> DriveResult<EraseReport> {
        debug!(phase = %ErasePhase::Listing, %prefix, "Sequential erase started");

        let mut listing = self.store.list_by_prefix(&prefix);
        let mut attempted = 0usize;
        let mut deleted = 0usize;
        let mut failures = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(&prefix, deleted)),
                next = listing.try_next() => next,
            };
            let next = match next {
                Ok(next) => next,
                Err(error) => {
                    drop(listing);
                    return Err(listing_failed(prefix, attempted, deleted, failures, error));
                }
            };
            let Some(meta) = next else {
                break;
            };

            attempted += 1;
            match self.store.delete(&meta.key).await {
                Ok(()) => deleted += 1,
                Err(cause) => {
                    warn!(key = %meta.key, error = %cause, "Delete failed");
                    failures.push(DeletionFailure {
                        key: meta.key,
                        cause,
                    });
                }
            }
        }
        drop(listing);

        finish(prefix, attempted, deleted, failures)
    }

    /// Remove only the `prefix/` marker, refusing if anything else remains.
    async fn erase_marker(
        &self,
        prefix: String,
        cancel: &CancellationToken,
    ) -> DriveResult<EraseReport> {
        if cancel.is_cancelled() {
            return Err(self.cancelled(&prefix, 0));
        }

        // The marker sorts first, so every page has to be read before the
        // prefix can be called empty.
        let remaining = self
            .store
            .list_by_prefix(&prefix)
            .try_fold(0usize, |count, meta| {
                let count = if meta.key == prefix { count } else { count + 1 };
                futures::future::ok(count)
            })
            .await?;
        if remaining > 0 {
            info!(%prefix, remaining, "Refusing to remove marker of a non-empty prefix");
            return Err(DriveError::PrefixNotEmpty { prefix, remaining });
        }

        self.store.delete(&prefix).await?;
        info!(%prefix, phase = %ErasePhase::Succeeded, "Removed prefix marker");
        Ok(EraseReport {
            prefix,
            attempted: 1,
            deleted: 1,
        })
    }

    fn cancelled(&self, prefix: &str, deleted: usize) -> DriveError {
        info!(%prefix, deleted, phase = %ErasePhase::Cancelled, "Erase cancelled");
        DriveError::Cancelled {
            operation: OPERATION,
        }
    }
}

/// Turn collected outcomes into the final result.
fn finish(
    prefix: String,
    attempted: usize,
    deleted: usize,
    mut failures: Vec<DeletionFailure>,
) -> DriveResult<EraseReport> {
    if failures.is_empty() {
        info!(%prefix, deleted, phase = %ErasePhase::Succeeded, "Erase complete");
        return Ok(EraseReport {
            prefix,
            attempted,
            deleted,
        });
    }

    failures.sort_by(|a, b| a.key.cmp(&b.key));
    warn!(
        %prefix,
        attempted,
        deleted,
        failed = failures.len(),
        phase = %ErasePhase::PartiallyFailed,
        "Erase finished with failures"
    );
    Err(DriveError::AggregatedDeletion {
        prefix,
        attempted,
        failures,
    })
}

/// A listing that broke off mid-erase. Deletions that already failed are
/// kept, and the listing error is reported against the prefix itself.
fn listing_failed(
    prefix: String,
    attempted: usize,
    deleted: usize,
    mut failures: Vec<DeletionFailure>,
    error: AppError,
) -> DriveError {
    warn!(%prefix, %error, deleted, failed = failures.len(), "Listing failed during erase");
    if failures.is_empty() {
        return DriveError::App(error);
    }

    failures.push(DeletionFailure {
        key: prefix.clone(),
        cause: error,
    });
    failures.sort_by(|a, b| a.key.cmp(&b.key));
    DriveError::AggregatedDeletion {
        prefix,
        attempted,
        failures,
    }
}

/// Normalize a prefix to end in exactly one `/`.
pub fn normalize_prefix(prefix: &str) -> AppResult<String> {
    let trimmed = prefix.trim().trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AppError::validation(
            "Refusing to erase an empty prefix (it would match every object)",
        ));
    }
    Ok(format!("{trimmed}/"))
}
