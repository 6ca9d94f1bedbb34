//! Wire protocol for PeerDrop: a single file pulled block by block over a
//! reliable, ordered, message-oriented channel.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{BLOCK_SIZE, CHUNK_SIZE, CHUNKS_PER_BLOCK, MessageType};
pub use envelope::{Frame, ProtocolError, WireMessage};
pub use messages::ControlMessage;
pub use types::{FileMeta, TransferState};
