//! In-process loopback transport.

use tokio::sync::mpsc;
use tracing::trace;

use peerdrop_protocol::Frame;
use peerdrop_transfer::{Transport, TransportError, TransportEvent};

/// Outbound half of one side of a loopback pair.
///
/// Frames sent here arrive, in order, on the other side's inbound queue.
/// Sending waits while the peer's queue is full.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    id: String,
    peer_id: String,
    to_self: mpsc::Sender<TransportEvent>,
    to_peer: mpsc::Sender<TransportEvent>,
}

/// One side of a loopback pair: its transport and the events it receives.
#[derive(Debug)]
pub struct Endpoint {
    pub transport: MemoryTransport,
    pub inbound: mpsc::Receiver<TransportEvent>,
}

/// Creates two connected endpoints named `"a"` and `"b"`.
///
/// Nothing is delivered until [`MemoryTransport::open`] is called on either
/// side.
pub fn pair(capacity: usize) -> (Endpoint, Endpoint) {
    named_pair("a", "b", capacity)
}

/// Like [`pair`], with explicit peer ids.
pub fn named_pair(a: &str, b: &str, capacity: usize) -> (Endpoint, Endpoint) {
    let (a_tx, a_rx) = mpsc::channel(capacity);
    let (b_tx, b_rx) = mpsc::channel(capacity);

    let a_end = Endpoint {
        transport: MemoryTransport {
            id: a.to_string(),
            peer_id: b.to_string(),
            to_self: a_tx.clone(),
            to_peer: b_tx.clone(),
        },
        inbound: a_rx,
    };
    let b_end = Endpoint {
        transport: MemoryTransport {
            id: b.to_string(),
            peer_id: a.to_string(),
            to_self: b_tx,
            to_peer: a_tx,
        },
        inbound: b_rx,
    };
    (a_end, b_end)
}

impl MemoryTransport {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Reports the channel open on both sides.
    pub async fn open(&self) -> Result<(), TransportError> {
        self.to_self
            .send(TransportEvent::Open {
                peer_id: self.peer_id.clone(),
            })
            .await
            .map_err(|_| TransportError::Closed)?;
        self.to_peer
            .send(TransportEvent::Open {
                peer_id: self.id.clone(),
            })
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Tells the peer the channel is gone.
    pub async fn close(&self) {
        if self.to_peer.send(TransportEvent::Closed).await.is_err() {
            trace!(peer = %self.peer_id, "peer already gone");
        }
    }

    /// Delivers a transport failure to the peer, as a dropped link would.
    pub async fn disconnect(&self) {
        if self.to_peer.send(TransportEvent::Disconnected).await.is_err() {
            trace!(peer = %self.peer_id, "peer already gone");
        }
    }
}

impl Transport for MemoryTransport {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.to_peer
            .send(TransportEvent::Data(frame))
            .await
            .map_err(|_| TransportError::Closed)
    }
}
