//! Transports that carry PeerDrop sessions.
//!
//! Each transport hands one session an ordered stream of
//! [`TransportEvent`](peerdrop_transfer::TransportEvent)s and implements
//! [`Transport`](peerdrop_transfer::Transport) for the outbound side:
//!
//! - [`memory`]: an in-process pair, for tests and same-process peers.
//! - [`ws`]: a WebSocket connection, binary frames for data and text frames
//!   for control messages.
//!
//! Reconnecting is a transport concern; see [`reconnection`]. A session that
//! loses its transport fails and is never resumed.

pub mod error;
pub mod memory;
mod pumps;
pub mod reconnection;
pub mod ws;

pub use error::ChannelError;
pub use memory::{Endpoint, MemoryTransport, pair};
pub use reconnection::{ReconnectConfig, connect_with_retry};
pub use ws::WsTransport;

/// Queue depth between a transport's pumps and its session.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Largest WebSocket message accepted (4 MiB); data frames carry one chunk.
pub const WS_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;
