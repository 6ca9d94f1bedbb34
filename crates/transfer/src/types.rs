use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::trace;

use peerdrop_protocol::FileMeta;

/// The finished file handed to the owner on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Reassembled in memory.
    Memory { meta: FileMeta, data: Bytes },
    /// Stored on disk at `path`.
    File { meta: FileMeta, path: PathBuf },
}

impl Artifact {
    pub fn meta(&self) -> &FileMeta {
        match self {
            Self::Memory { meta, .. } | Self::File { meta, .. } => meta,
        }
    }

    /// In-memory contents, if this artifact lives in memory.
    pub fn data(&self) -> Option<&Bytes> {
        match self {
            Self::Memory { data, .. } => Some(data),
            Self::File { .. } => None,
        }
    }

    /// On-disk location, if this artifact is a file.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Memory { .. } => None,
            Self::File { path, .. } => Some(path),
        }
    }
}

/// Notifications a session emits to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// The transport is open towards `peer_id`.
    Open { peer_id: String },
    /// The protocol handshake can start.
    Connected,
    /// The transport went away.
    Disconnected,
    /// A failure was reported; the session is now `Failed` unless it was
    /// already terminal.
    Error(String),
    /// Receiver only: the sender announced a file.
    Incoming(FileMeta),
    /// Throughput in bytes per second, measured per block.
    TransferRate(f64),
    /// Bytes sent (sender) or received (receiver) so far.
    Progress { transferred: u64, total: u64 },
    Completed(Artifact),
    Cancelled,
}

/// Sending half of a session's event stream.
///
/// Emission never blocks; events sent after the owner dropped the receiver
/// are discarded.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<TransferEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<TransferEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: TransferEvent) {
        if let Err(e) = self.tx.send(event) {
            trace!(event = ?e.0, "event receiver dropped");
        }
    }
}

/// Creates a connected event sink and receiver.
pub fn event_channel() -> (EventSink, mpsc::UnboundedReceiver<TransferEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink::new(tx), rx)
}

/// Running totals for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    /// Sum of chunk lengths sent or received; never exceeds the file size.
    pub bytes_transferred: u64,
    /// Receiver: next block to request. Sender: next block not yet served.
    pub current_block_index: u64,
    /// `ceil(file_size / chunk_size)`.
    pub total_chunks: u64,
}
