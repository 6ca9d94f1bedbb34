//! The seam between the protocol core and the message channel.
//!
//! A transport delivers [`TransportEvent`]s to exactly one session, in order,
//! and accepts outbound [`Frame`]s through [`Transport::send`]. It never
//! interprets payloads.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use tracing::debug;

use peerdrop_protocol::{ControlMessage, Frame, WireMessage};

use crate::TransferError;

/// Errors reported by a transport when sending.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("channel closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Inbound notifications from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The channel is ready; `peer_id` identifies the remote end.
    Open { peer_id: String },
    /// One message from the peer.
    Data(Frame),
    /// The channel was closed (by either side).
    Closed,
    /// The underlying link dropped without a clean close.
    Disconnected,
    Error(String),
}

/// Outbound half of a reliable, ordered, message-oriented channel.
pub trait Transport: Send + Sync {
    /// Queues one frame for delivery.
    fn send(&self, frame: Frame) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, frame: Frame) -> impl Future<Output = Result<(), TransportError>> + Send {
        T::send(self, frame)
    }
}

impl Transport for mpsc::UnboundedSender<Frame> {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        mpsc::UnboundedSender::send(self, frame).map_err(|_| TransportError::Closed)
    }
}

/// Encodes and sends one protocol message.
pub(crate) async fn send_message<T: Transport>(
    transport: &T,
    message: &WireMessage,
) -> Result<(), TransferError> {
    let frame = message.to_frame()?;
    transport.send(frame).await?;
    Ok(())
}

pub(crate) async fn send_control<T: Transport>(
    transport: &T,
    message: ControlMessage,
) -> Result<(), TransferError> {
    send_message(transport, &WireMessage::Control(message)).await
}

/// Sends `Cancel{}` without letting a dead transport mask the cancel.
pub(crate) async fn send_cancel_best_effort<T: Transport>(transport: &T) {
    if let Err(e) = send_control(transport, ControlMessage::Cancel).await {
        debug!("cancel not delivered: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn send_message_encodes_control_as_text() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        send_message(&tx, &WireMessage::Control(ControlMessage::Cancel))
            .await
            .unwrap();
        assert_eq!(
            rx.recv().await,
            Some(Frame::Text(r#"{"type":"file:cancel"}"#.into()))
        );
    }

    #[tokio::test]
    async fn send_message_encodes_data_as_binary() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        send_message(&tx, &WireMessage::Data(Bytes::from_static(b"xy")))
            .await
            .unwrap();
        assert_eq!(rx.recv().await, Some(Frame::Binary(Bytes::from_static(b"xy"))));
    }

    #[tokio::test]
    async fn closed_channel_reports_error() {
        let (tx, rx) = mpsc::unbounded_channel::<Frame>();
        drop(rx);
        let err = send_message(&tx, &WireMessage::Control(ControlMessage::Completed))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Transport(TransportError::Closed)));
    }

    #[tokio::test]
    async fn arc_transport_delegates() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let shared = Arc::new(tx);
        Transport::send(&shared, Frame::Text("x".into()))
            .await
            .unwrap();
        assert_eq!(rx.recv().await, Some(Frame::Text("x".into())));
    }
}
