//! Write side of a transfer: where the receiver's bytes go.

use std::future::Future;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use peerdrop_protocol::FileMeta;

use crate::TransferError;
use crate::types::Artifact;
use crate::validation::validate_file_name;

/// Append-only accumulation of received chunks.
///
/// Chunks are appended in arrival order and concatenated in that order by
/// [`finalize`](ByteSink::finalize). A sink that is aborted must not leave a
/// partial file behind.
pub trait ByteSink: Send {
    /// Prepares storage for the announced file. Called once, before any data.
    fn begin(&mut self, meta: &FileMeta) -> impl Future<Output = Result<(), TransferError>> + Send;

    fn append(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), TransferError>> + Send;

    /// Turns everything appended so far into the finished artifact.
    fn finalize(self, meta: FileMeta) -> impl Future<Output = Result<Artifact, TransferError>> + Send
    where
        Self: Sized;

    /// Discards whatever was appended.
    fn abort(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}

fn not_started() -> TransferError {
    TransferError::Io(std::io::Error::other("sink used before begin"))
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Collects chunks in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    chunks: Vec<Bytes>,
    len: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes appended so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl ByteSink for MemorySink {
    async fn begin(&mut self, _meta: &FileMeta) -> Result<(), TransferError> {
        self.chunks.clear();
        self.len = 0;
        Ok(())
    }

    async fn append(&mut self, chunk: Bytes) -> Result<(), TransferError> {
        self.len += chunk.len();
        self.chunks.push(chunk);
        Ok(())
    }

    async fn finalize(self, meta: FileMeta) -> Result<Artifact, TransferError> {
        let data = if self.chunks.len() == 1 {
            self.chunks.into_iter().next().unwrap_or_default()
        } else {
            let mut buf = BytesMut::with_capacity(self.len);
            for chunk in &self.chunks {
                buf.extend_from_slice(chunk);
            }
            buf.freeze()
        };
        Ok(Artifact::Memory { meta, data })
    }

    async fn abort(self) {}
}

// ---------------------------------------------------------------------------
// FileSink
// ---------------------------------------------------------------------------

/// Streams chunks to `<dir>/<name>.part` and renames it to `<dir>/<name>` on
/// finalize. An existing file with the same name is replaced.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    open: Option<OpenPart>,
}

#[derive(Debug)]
struct OpenPart {
    part_path: PathBuf,
    final_path: PathBuf,
    writer: BufWriter<tokio::fs::File>,
}

impl FileSink {
    /// Creates a sink that stores the received file in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ByteSink for FileSink {
    async fn begin(&mut self, meta: &FileMeta) -> Result<(), TransferError> {
        validate_file_name(&meta.name)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let final_path = self.dir.join(&meta.name);
        let part_path = self.dir.join(format!("{}.part", meta.name));
        let file = tokio::fs::File::create(&part_path).await?;
        debug!(path = %part_path.display(), size = meta.size, "receiving into part file");

        self.open = Some(OpenPart {
            part_path,
            final_path,
            writer: BufWriter::new(file),
        });
        Ok(())
    }

    async fn append(&mut self, chunk: Bytes) -> Result<(), TransferError> {
        let open = self.open.as_mut().ok_or_else(not_started)?;
        open.writer.write_all(&chunk).await?;
        Ok(())
    }

    async fn finalize(self, meta: FileMeta) -> Result<Artifact, TransferError> {
        let open = self.open.ok_or_else(not_started)?;
        let part_path = open.part_path.clone();
        match open.commit().await {
            Ok(path) => Ok(Artifact::File { meta, path }),
            Err(e) => {
                remove_part(&part_path).await;
                Err(e)
            }
        }
    }

    async fn abort(self) {
        let Some(open) = self.open else {
            return;
        };
        drop(open.writer);
        remove_part(&open.part_path).await;
    }
}

impl OpenPart {
    /// Flushes the part file to disk and moves it to its final name.
    async fn commit(mut self) -> Result<PathBuf, TransferError> {
        self.writer.flush().await?;
        self.writer.get_ref().sync_all().await?;
        drop(self.writer);

        tokio::fs::rename(&self.part_path, &self.final_path).await?;
        debug!(path = %self.final_path.display(), "file stored");
        Ok(self.final_path)
    }
}

async fn remove_part(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), "failed to remove part file: {e}");
    }
}
