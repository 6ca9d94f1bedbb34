//! WebSocket read and write pumps.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use peerdrop_protocol::Frame;
use peerdrop_transfer::TransportEvent;

/// Maps a protocol frame onto a WebSocket message.
pub(crate) fn to_message(frame: Frame) -> tungstenite::Message {
    match frame {
        Frame::Binary(bytes) => tungstenite::Message::Binary(bytes),
        Frame::Text(text) => tungstenite::Message::Text(text.into()),
    }
}

/// Writes messages to the WebSocket.
///
/// On cancel, whatever is already queued is still written before the close
/// frame goes out.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                while let Ok(m) = write_rx.try_recv() {
                    if let Err(e) = write.send(m).await {
                        debug!("WebSocket write error while draining: {e}");
                        return;
                    }
                }
                break;
            }
            msg = write_rx.recv() => {
                match msg {
                    Some(m) => {
                        if let Err(e) = write.send(m).await {
                            error!("WebSocket write error: {e}");
                            return;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let _ = write.send(tungstenite::Message::Close(None)).await;
}

/// Reads messages from the WebSocket and forwards them as transport events.
///
/// Binary messages are data frames and text messages are control frames;
/// the pump does not look inside either. Ends the connection (cancelling the
/// write pump) when the socket closes or errors.
pub(crate) async fn read_pump<S>(
    mut read: S,
    events_tx: mpsc::Sender<TransportEvent>,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let last = loop {
        tokio::select! {
            _ = cancel.cancelled() => break None,

            msg = read.next() => {
                let event = match msg {
                    Some(Ok(tungstenite::Message::Binary(bytes))) => {
                        trace!(len = bytes.len(), "received binary frame");
                        TransportEvent::Data(Frame::Binary(bytes))
                    }
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        trace!(len = text.len(), "received text frame");
                        TransportEvent::Data(Frame::Text(text.as_str().to_owned()))
                    }
                    Some(Ok(tungstenite::Message::Ping(data))) => {
                        trace!("received ping, sending pong");
                        let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                        continue;
                    }
                    Some(Ok(tungstenite::Message::Pong(_))) => {
                        trace!("received pong");
                        continue;
                    }
                    Some(Ok(tungstenite::Message::Frame(_))) => continue,
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        debug!(?frame, "received close frame");
                        break Some(TransportEvent::Closed);
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break Some(TransportEvent::Error(e.to_string()));
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break Some(TransportEvent::Disconnected);
                    }
                };
                if events_tx.send(event).await.is_err() {
                    debug!("session gone, stopping read pump");
                    break None;
                }
            }
        }
    };

    if let Some(event) = last {
        let _ = events_tx.send(event).await;
    }
    cancel.cancel();
}
