//! Streams folder subtrees and file sets into zip archives.
//!
//! The entry list is planned up front in depth-first order, then a single
//! async producer opens each object and forwards its chunks to the blocking
//! writer. Memory is bounded by `channel_depth * chunk_bytes`.

use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use netdrive_core::error::{AppError, DriveError, ErrorKind};
use netdrive_core::result::DriveResult;
use netdrive_core::traits::storage::{ByteStream, ObjectStore};
use netdrive_entity::file::File;
use netdrive_entity::folder::Folder;

use super::naming::EntryNamer;
use super::stream::ArchiveStream;
use super::writer::{ArchiveCommand, run_writer};
use crate::error::ArchiveError;

const OPERATION: &str = "archive build";

/// One planned archive entry.
#[derive(Debug)]
enum PlannedEntry<'a> {
    Directory(String),
    File { path: String, file: &'a File },
}

/// Why the producer stopped early.
enum Halt {
    /// The producer failed; the writer is told to abandon the spool.
    Failed(DriveError),
    /// The writer hung up; its own result explains why.
    WriterGone,
}

impl From<DriveError> for Halt {
    fn from(err: DriveError) -> Self {
        Self::Failed(err)
    }
}

/// Builds zip archives from object store content.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    store: Arc<dyn ObjectStore>,
    chunk_bytes: usize,
    channel_depth: usize,
}

impl ArchiveBuilder {
    /// Create a builder. Zero limits are raised to one.
    pub fn new(store: Arc<dyn ObjectStore>, chunk_bytes: usize, channel_depth: usize) -> Self {
        Self {
            store,
            chunk_bytes: chunk_bytes.max(1),
            channel_depth: channel_depth.max(1),
        }
    }

    /// Archive every file under `root`, with paths relative to `root`.
    ///
    /// Files directly in `root` appear under their own name; files in a
    /// subfolder `A/B` appear as `A/B/name`. Every subfolder also gets a
    /// directory entry. Placeholder files are skipped. Any missing object,
    /// read failure, or cancellation aborts the build and nothing is
    /// returned.
    #[instrument(skip(self, root, cancel), fields(folder_id = %root.id))]
    pub async fn build(&self, root: &Folder, cancel: &CancellationToken) -> DriveResult<ArchiveStream> {
        let mut plan = Vec::new();
        plan_folder(root, "", &mut EntryNamer::new(), &mut plan);
        self.run(plan, cancel).await
    }

    /// Archive a flat set of files at the archive root.
    #[instrument(skip(self, files, cancel), fields(files = files.len()))]
    pub async fn build_flat(
        &self,
        files: &[File],
        cancel: &CancellationToken,
    ) -> DriveResult<ArchiveStream> {
        let mut namer = EntryNamer::new();
        let plan = files
            .iter()
            .filter(|file| !file.is_placeholder())
            .map(|file| PlannedEntry::File {
                path: namer.claim("", &file.name),
                file,
            })
            .collect();
        self.run(plan, cancel).await
    }

    async fn run(
        &self,
        plan: Vec<PlannedEntry<'_>>,
        cancel: &CancellationToken,
    ) -> DriveResult<ArchiveStream> {
        let (tx, rx) = mpsc::channel(self.channel_depth);
        let writer = tokio::task::spawn_blocking(move || run_writer(rx));

        let produced = self.produce(&plan, &tx, cancel).await;
        let produced = match produced {
            Ok(()) => tx
                .send(ArchiveCommand::Finish)
                .await
                .map_err(|_| Halt::WriterGone),
            Err(halt) => Err(halt),
        };
        drop(tx);

        let written = writer.await.map_err(ArchiveError::from);
        match (produced, written) {
            (Ok(()), Ok(Ok(spool))) => {
                info!(
                    entries = spool.entries,
                    bytes = spool.size,
                    "Archive ready"
                );
                Ok(ArchiveStream::from_spool(spool))
            }
            (Err(Halt::Failed(err)), _) => {
                warn!(error = %err, "Archive build aborted");
                Err(err)
            }
            (_, Ok(Err(writer_err))) | (_, Err(writer_err)) => Err(writer_err.into()),
            (Err(Halt::WriterGone), Ok(Ok(_))) => Err(ArchiveError::Aborted.into()),
        }
    }

    async fn produce(
        &self,
        plan: &[PlannedEntry<'_>],
        tx: &mpsc::Sender<ArchiveCommand>,
        cancel: &CancellationToken,
    ) -> Result<(), Halt> {
        for entry in plan {
            if cancel.is_cancelled() {
                return Err(cancelled().into());
            }

            match entry {
                PlannedEntry::Directory(path) => {
                    send(tx, ArchiveCommand::Directory(path.clone()), cancel).await?;
                }
                PlannedEntry::File { path, file } => {
                    let stream = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled().into()),
                        opened = self.open(file) => opened?,
                    };
                    debug!(path = %path, key = %file.storage_key, "Adding file");
                    send(
                        tx,
                        ArchiveCommand::StartFile {
                            path: path.clone(),
                            size: u64::try_from(file.size).unwrap_or(0),
                        },
                        cancel,
                    )
                    .await?;
                    self.copy(file, stream, tx, cancel).await?;
                }
            }
        }
        Ok(())
    }

    async fn open(&self, file: &File) -> DriveResult<ByteStream> {
        self.store.open(&file.storage_key).await.map_err(|e| {
            if e.is_not_found() {
                DriveError::ObjectNotFound {
                    file_id: file.id,
                    key: file.storage_key.clone(),
                }
            } else {
                DriveError::App(e)
            }
        })
    }

    /// Forward one object's content, re-chunked to at most `chunk_bytes`.
    async fn copy(
        &self,
        file: &File,
        mut stream: ByteStream,
        tx: &mpsc::Sender<ArchiveCommand>,
        cancel: &CancellationToken,
    ) -> Result<(), Halt> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled().into()),
                next = stream.try_next() => next,
            };

            let chunk = match next {
                Ok(Some(chunk)) => chunk,
                Ok(None) => return Ok(()),
                Err(e) => {
                    return Err(DriveError::App(AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed reading object '{}'", file.storage_key),
                        e,
                    ))
                    .into());
                }
            };

            for piece in split(chunk, self.chunk_bytes) {
                send(tx, ArchiveCommand::Chunk(piece), cancel).await?;
            }
        }
    }
}

/// Depth-first plan: a folder's files, then each subfolder's directory entry
/// followed by its contents.
fn plan_folder<'a>(
    folder: &'a Folder,
    dir: &str,
    namer: &mut EntryNamer,
    plan: &mut Vec<PlannedEntry<'a>>,
) {
    for file in folder.files.iter().filter(|f| !f.is_placeholder()) {
        plan.push(PlannedEntry::File {
            path: namer.claim(dir, &file.name),
            file,
        });
    }
    for child in &folder.folders {
        let child_dir = format!("{}/", namer.claim(dir, &child.name));
        plan.push(PlannedEntry::Directory(child_dir.clone()));
        plan_folder(child, &child_dir, namer, plan);
    }
}

async fn send(
    tx: &mpsc::Sender<ArchiveCommand>,
    command: ArchiveCommand,
    cancel: &CancellationToken,
) -> Result<(), Halt> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled().into()),
        sent = tx.send(command) => sent.map_err(|_| Halt::WriterGone),
    }
}

fn split(chunk: Bytes, max: usize) -> impl Iterator<Item = Bytes> {
    let len = chunk.len();
    (0..len)
        .step_by(max)
        .map(move |start| chunk.slice(start..(start + max).min(len)))
}

fn cancelled() -> DriveError {
    DriveError::Cancelled {
        operation: OPERATION,
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};
    use std::time::Duration;

    use chrono::Utc;
    use netdrive_core::types::{FileId, FolderId};
    use netdrive_storage::providers::MemoryObjectStore;
    use tokio::io::{AsyncReadExt, AsyncSeekExt};
    use zip::ZipArchive;

    use super::*;

    fn folder(name: &str) -> Folder {
        Folder {
            id: FolderId::new(),
            name: name.to_string(),
            owner: "alice".to_string(),
            parent_id: None,
            created_at: Utc::now(),
            ancestry: Vec::new(),
            folders: Vec::new(),
            files: Vec::new(),
        }
    }

    fn file(folder: &Folder, name: &str) -> File {
        let id = FileId::new();
        File {
            id,
            name: name.to_string(),
            storage_key: File::storage_key_for("alice", folder.id, id),
            size: 1,
            folder_id: folder.id,
            owner: "alice".to_string(),
            uploaded_at: Utc::now(),
            is_dir: false,
        }
    }

    async fn unzip(mut archive: ArchiveStream) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut bytes = Vec::new();
        archive.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes.len() as u64, archive.size());
        ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    fn entry_text(zip: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut text = String::new();
        zip.by_name(name).unwrap().read_to_string(&mut text).unwrap();
        text
    }

    fn builder(store: &Arc<MemoryObjectStore>) -> ArchiveBuilder {
        ArchiveBuilder::new(store.clone() as Arc<dyn ObjectStore>, 64 * 1024, 8)
    }

    #[tokio::test]
    async fn test_round_trip_preserves_relative_paths() {
        let store = Arc::new(MemoryObjectStore::new());
        let mut root = folder("Root");
        let mut sub = folder("sub");
        let a = file(&root, "a.txt");
        let b = file(&sub, "b.txt");
        store.insert(a.storage_key.clone(), "A").await;
        store.insert(b.storage_key.clone(), "B").await;
        root.files.push(a);
        sub.files.push(b);
        root.folders.push(sub);

        let archive = builder(&store)
            .build(&root, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(archive.content_type(), "application/zip");
        assert_eq!(archive.entries(), 3);

        let mut zip = unzip(archive).await;
        let names: Vec<&str> = zip.file_names().collect();
        assert!(names.contains(&"sub/"));
        assert_eq!(entry_text(&mut zip, "a.txt"), "A");
        assert_eq!(entry_text(&mut zip, "sub/b.txt"), "B");
    }

    #[tokio::test]
    async fn test_missing_object_aborts_whole_build() {
        let store = Arc::new(MemoryObjectStore::new());
        let mut root = folder("Root");
        for i in 0..5 {
            let f = file(&root, &format!("{i}.txt"));
            if i != 2 {
                store.insert(f.storage_key.clone(), format!("file {i}")).await;
            }
            root.files.push(f);
        }
        let missing = root.files[2].id;

        let err = builder(&store)
            .build(&root, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            DriveError::ObjectNotFound { file_id, .. } => assert_eq!(file_id, missing),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_names_are_suffixed_and_placeholders_skipped() {
        let store = Arc::new(MemoryObjectStore::new());
        let mut root = folder("Root");
        for body in ["first", "second"] {
            let f = file(&root, "a.txt");
            store.insert(f.storage_key.clone(), body).await;
            root.files.push(f);
        }
        let mut marker = file(&root, "ghost");
        marker.is_dir = true;
        root.files.push(marker);
        let mut sneaky = folder("..");
        let inner = file(&sneaky, "x.txt");
        store.insert(inner.storage_key.clone(), "x").await;
        sneaky.files.push(inner);
        root.folders.push(sneaky);

        let archive = builder(&store)
            .build(&root, &CancellationToken::new())
            .await
            .unwrap();
        let mut zip = unzip(archive).await;

        assert_eq!(entry_text(&mut zip, "a.txt"), "first");
        assert_eq!(entry_text(&mut zip, "a (1).txt"), "second");
        assert_eq!(entry_text(&mut zip, "_/x.txt"), "x");
        assert!(zip.by_name("ghost").is_err());
    }

    #[tokio::test]
    async fn test_large_objects_are_rechunked() {
        let store = Arc::new(MemoryObjectStore::new().with_chunk_size(1000));
        let mut root = folder("Root");
        let big = file(&root, "big.bin");
        let body: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        store.insert(big.storage_key.clone(), body.clone()).await;
        root.files.push(big);

        let archive = ArchiveBuilder::new(store.clone() as Arc<dyn ObjectStore>, 7, 2)
            .build(&root, &CancellationToken::new())
            .await
            .unwrap();
        let mut zip = unzip(archive).await;

        let mut out = Vec::new();
        zip.by_name("big.bin").unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, body);
    }

    #[tokio::test]
    async fn test_empty_folders_survive() {
        let store = Arc::new(MemoryObjectStore::new());
        let mut root = folder("Root");
        root.folders.push(folder("empty"));

        let archive = builder(&store)
            .build(&root, &CancellationToken::new())
            .await
            .unwrap();
        let zip = unzip(archive).await;

        assert_eq!(zip.file_names().collect::<Vec<_>>(), vec!["empty/"]);
    }

    #[tokio::test]
    async fn test_cancelled_build_returns_cancelled() {
        let store = Arc::new(MemoryObjectStore::new());
        let mut root = folder("Root");
        let f = file(&root, "a.txt");
        store.insert(f.storage_key.clone(), "A").await;
        root.files.push(f);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = builder(&store).build(&root, &cancel).await.unwrap_err();
        assert!(matches!(err, DriveError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_a_slow_open() {
        let store = Arc::new(MemoryObjectStore::new().with_open_delay(Duration::from_secs(30)));
        let mut root = folder("Root");
        let f = file(&root, "slow.bin");
        store.insert(f.storage_key.clone(), "S").await;
        root.files.push(f);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = builder(&store).build(&root, &cancel).await.unwrap_err();

        assert!(matches!(err, DriveError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_flat_archive_and_seek() {
        let store = Arc::new(MemoryObjectStore::new());
        let home = folder("Root");
        let docs = folder("docs");
        let a = file(&home, "same.txt");
        let b = file(&docs, "same.txt");
        store.insert(a.storage_key.clone(), "home").await;
        store.insert(b.storage_key.clone(), "docs").await;

        let mut archive = builder(&store)
            .build_flat(&[a, b], &CancellationToken::new())
            .await
            .unwrap();

        let mut head = [0u8; 4];
        archive.read_exact(&mut head).await.unwrap();
        assert_eq!(&head, b"PK\x03\x04");
        archive.seek(std::io::SeekFrom::Start(0)).await.unwrap();

        let mut zip = unzip(archive).await;
        assert_eq!(entry_text(&mut zip, "same.txt"), "home");
        assert_eq!(entry_text(&mut zip, "same (1).txt"), "docs");
    }
}
