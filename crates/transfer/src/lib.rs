//! Block-pull file transfer over a reliable, ordered message channel.
//!
//! The receiver drives flow control: it requests one block at a time and the
//! sender answers with that block split into fixed-size chunk messages. Both
//! roles are single-threaded state machines fed by a [`session::run_session`]
//! loop; the transport itself is a collaborator behind [`Transport`].

mod chunked;
pub mod config;
mod progress;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod sink;
pub mod source;
pub mod transport;
mod types;
mod validation;

pub use chunked::{ChunkPlanner, Chunks};
pub use config::TransferConfig;
pub use progress::RateEstimator;
pub use receiver::ReceiverSession;
pub use sender::SenderSession;
pub use session::{Session, TransferHandle, run_session, spawn_session};
pub use sink::{ByteSink, FileSink, MemorySink};
pub use source::{ByteSource, FileSource, MemorySource};
pub use transport::{Transport, TransportError, TransportEvent};
pub use types::{Artifact, EventSink, SessionCounters, TransferEvent, event_channel};
pub use validation::validate_file_name;

use peerdrop_protocol::ProtocolError;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("peer out of sync: {0}")]
    Desync(String),

    #[error("no message from peer for {0:?}")]
    Stalled(std::time::Duration),
}
