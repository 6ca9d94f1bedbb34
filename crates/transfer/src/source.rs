//! Read side of a transfer: where the sender's bytes come from.

use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use peerdrop_protocol::FileMeta;

use crate::TransferError;
use crate::types::Artifact;

/// A random-access, immutable byte provider.
///
/// Reading the same range twice must yield identical bytes; the sender relies
/// on this to answer repeated requests for one block.
pub trait ByteSource: Send {
    /// Metadata announced to the receiver.
    fn meta(&self) -> &FileMeta;

    /// Reads `[start, end)`, with `end` clamped to the file size.
    fn read_range(
        &mut self,
        start: u64,
        end: u64,
    ) -> impl Future<Output = Result<Bytes, TransferError>> + Send;

    /// What the sender reports to its owner once the transfer completes.
    fn artifact(&self) -> Artifact;
}

fn clamp(start: u64, end: u64, size: u64) -> (u64, u64) {
    let end = end.min(size);
    (start.min(end), end)
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Serves a file held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    meta: FileMeta,
    data: Bytes,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            meta: FileMeta::new(name, data.len() as u64, mime_type),
            data,
        }
    }
}

impl ByteSource for MemorySource {
    fn meta(&self) -> &FileMeta {
        &self.meta
    }

    async fn read_range(&mut self, start: u64, end: u64) -> Result<Bytes, TransferError> {
        let (start, end) = clamp(start, end, self.meta.size);
        Ok(self.data.slice(start as usize..end as usize))
    }

    fn artifact(&self) -> Artifact {
        Artifact::Memory {
            meta: self.meta.clone(),
            data: self.data.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// Serves a file from disk.
///
/// The file name is taken from the path and the MIME type is guessed from its
/// extension.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: tokio::fs::File,
    meta: FileMeta,
}

impl FileSource {
    /// Opens `path` for reading and captures its metadata.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::File::open(&path).await?;
        let size = file.metadata().await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::InvalidFileName(path.display().to_string()))?;
        let mime_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            meta: FileMeta::new(name, size, mime_type),
            path,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn meta(&self) -> &FileMeta {
        &self.meta
    }

    async fn read_range(&mut self, start: u64, end: u64) -> Result<Bytes, TransferError> {
        let (start, end) = clamp(start, end, self.meta.size);
        let mut buf = vec![0u8; (end - start) as usize];
        self.file.seek(SeekFrom::Start(start)).await?;
        self.file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    fn artifact(&self) -> Artifact {
        Artifact::File {
            meta: self.meta.clone(),
            path: self.path.clone(),
        }
    }
}
