//! WebSocket transport.
//!
//! One WebSocket connection carries one session. Data chunks travel as binary
//! messages and control messages as text messages, so the framing rule from
//! `peerdrop_protocol::WireMessage` maps directly onto WebSocket opcodes.

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{WebSocketStream, accept_async_with_config, connect_async_with_config, tungstenite};
use tokio_util::sync::CancellationToken;
use tracing::info;

use peerdrop_protocol::Frame;
use peerdrop_transfer::{Transport, TransportError, TransportEvent};

use crate::error::ChannelError;
use crate::pumps::{read_pump, to_message, write_pump};
use crate::{DEFAULT_CHANNEL_CAPACITY, WS_MAX_MESSAGE_SIZE};

/// Outbound half of a WebSocket connection.
///
/// Dropping every clone closes the connection once queued frames are written.
#[derive(Debug, Clone)]
pub struct WsTransport {
    peer_id: String,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
}

fn ws_config() -> WebSocketConfig {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
    ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
    ws_config
}

impl WsTransport {
    /// Connects to `url` as a client.
    ///
    /// The returned receiver starts with [`TransportEvent::Open`].
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<TransportEvent>), ChannelError> {
        let (ws_stream, _) = connect_async_with_config(url, Some(ws_config()), false).await?;
        info!(%url, "WebSocket connected");
        Ok(Self::spawn(ws_stream, url.to_string()).await)
    }

    /// Completes the server side of a WebSocket upgrade on an accepted socket.
    pub async fn accept(stream: TcpStream) -> Result<(Self, mpsc::Receiver<TransportEvent>), ChannelError> {
        let peer_addr = stream.peer_addr()?;
        let ws_stream = accept_async_with_config(stream, Some(ws_config())).await?;
        info!(%peer_addr, "WebSocket connection established");
        Ok(Self::spawn(ws_stream, peer_addr.to_string()).await)
    }

    async fn spawn<S>(ws_stream: WebSocketStream<S>, peer_id: String) -> (Self, mpsc::Receiver<TransportEvent>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (write, read) = ws_stream.split();
        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(DEFAULT_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        // Cannot fail: the receiver is still held here.
        let _ = events_tx
            .send(TransportEvent::Open {
                peer_id: peer_id.clone(),
            })
            .await;

        tokio::spawn(write_pump(write, write_rx, cancel.clone()));
        tokio::spawn(read_pump(read, events_tx, write_tx.clone(), cancel.clone()));

        let transport = Self {
            peer_id,
            write_tx,
            cancel,
        };
        (transport, events_rx)
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Flushes queued frames, sends a close frame and stops both pumps.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Transport for WsTransport {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.write_tx
            .send(to_message(frame))
            .await
            .map_err(|_| TransportError::Closed)
    }
}
