//! Receiving role: pulls the file one block at a time.

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use peerdrop_protocol::{ControlMessage, FileMeta, TransferState, WireMessage};

use crate::TransferError;
use crate::chunked::ChunkPlanner;
use crate::progress::RateEstimator;
use crate::session::Session;
use crate::sink::ByteSink;
use crate::transport::{Transport, TransportError, send_cancel_best_effort, send_control};
use crate::types::{EventSink, SessionCounters, TransferEvent};

/// Receiver state machine: `Idle → AwaitingMeta → Transferring → {Completed,
/// Cancelled, Failed}`.
///
/// The receiver counts chunks from 1 and requests the next block each time the
/// counter crosses a block boundary. The last chunk of the file completes the
/// transfer; once every byte is in hand a late `Cancel` is ignored.
pub struct ReceiverSession<K, T> {
    sink: Option<K>,
    transport: T,
    events: EventSink,
    planner: ChunkPlanner,
    state: TransferState,
    meta: Option<FileMeta>,
    counters: SessionCounters,
    chunks_received: u64,
    rate: RateEstimator,
    open: bool,
    /// Cancelled before the transport opened; the peer is told on open.
    cancel_unsent: bool,
}

impl<K: ByteSink, T: Transport> ReceiverSession<K, T> {
    pub fn new(sink: K, transport: T, events: EventSink) -> Self {
        Self::with_planner(sink, transport, events, ChunkPlanner::default())
    }

    /// Uses a custom chunk geometry. Both peers must agree on it.
    pub fn with_planner(sink: K, transport: T, events: EventSink, planner: ChunkPlanner) -> Self {
        Self {
            sink: Some(sink),
            transport,
            events,
            planner,
            state: TransferState::Idle,
            meta: None,
            counters: SessionCounters::default(),
            chunks_received: 0,
            rate: RateEstimator::new(planner.block_size()),
            open: false,
            cancel_unsent: false,
        }
    }

    /// Metadata announced by the sender, once `file:start` has arrived.
    pub fn meta(&self) -> Option<&FileMeta> {
        self.meta.as_ref()
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    async fn abort_sink(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.abort().await;
        }
    }

    async fn request_block(&mut self, index: u64) -> Result<(), TransferError> {
        self.counters.current_block_index = index;
        debug!(index, "requesting block");
        send_control(&self.transport, ControlMessage::Request { index }).await
    }

    async fn handle_start(&mut self, meta: FileMeta) -> Result<(), TransferError> {
        if !matches!(self.state, TransferState::Idle | TransferState::AwaitingMeta) {
            warn!(state = ?self.state, "duplicate file:start, ignoring");
            return Ok(());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Err(TransferError::Desync("file:start after the sink was released".into()));
        };
        sink.begin(&meta).await?;

        info!(file = %meta.name, size = meta.size, mime = %meta.mime_type, "incoming file");
        self.counters.total_chunks = self.planner.total_chunks(meta.size);
        self.meta = Some(meta.clone());
        self.state = TransferState::Transferring;
        self.events.emit(TransferEvent::Incoming(meta));
        self.rate.reset();
        self.rate.sample();

        if self.counters.total_chunks == 0 {
            return self.finish().await;
        }
        self.request_block(0).await
    }

    async fn handle_chunk(&mut self, chunk: Bytes) -> Result<(), TransferError> {
        if self.state != TransferState::Transferring {
            warn!(len = chunk.len(), state = ?self.state, "data outside transfer, ignoring");
            return Ok(());
        }
        let size = self.meta.as_ref().map_or(0, |m| m.size);
        let total = self.counters.total_chunks;

        let received = self.counters.bytes_transferred + chunk.len() as u64;
        if received > size || self.chunks_received >= total {
            return Err(TransferError::Desync(format!(
                "chunk {} brings {received} of {size} bytes",
                self.chunks_received + 1
            )));
        }

        self.chunks_received += 1;
        self.counters.bytes_transferred = received;
        trace!(chunk = self.chunks_received, len = chunk.len(), "chunk received");
        let Some(sink) = self.sink.as_mut() else {
            return Err(TransferError::Desync("data after the sink was released".into()));
        };
        sink.append(chunk).await?;
        self.events.emit(TransferEvent::Progress {
            transferred: received,
            total: size,
        });

        if self.planner.is_last_chunk_of_block(total, self.chunks_received) {
            if let Some(rate) = self.rate.sample() {
                self.events.emit(TransferEvent::TransferRate(rate));
            }
        }

        if self.chunks_received == total {
            if received != size {
                return Err(TransferError::Desync(format!(
                    "all {total} chunks arrived but only {received} of {size} bytes"
                )));
            }
            return self.finish().await;
        }
        if self.planner.is_last_chunk_of_block(total, self.chunks_received) {
            let next = self.planner.block_of_chunk(self.chunks_received) + 1;
            self.request_block(next).await?;
        }
        Ok(())
    }

    /// Every byte is in hand: finalize, report, and confirm to the sender.
    async fn finish(&mut self) -> Result<(), TransferError> {
        let (Some(sink), Some(meta)) = (self.sink.take(), self.meta.clone()) else {
            return Err(TransferError::Desync("transfer finished twice".into()));
        };
        let artifact = sink.finalize(meta).await?;

        self.state = TransferState::Completed;
        info!(
            file = %artifact.meta().name,
            bytes = self.counters.bytes_transferred,
            "transfer completed"
        );
        self.events.emit(TransferEvent::Completed(artifact));

        if let Err(e) = send_control(&self.transport, ControlMessage::Completed).await {
            warn!("completion not delivered to sender: {e}");
        }
        Ok(())
    }

    async fn handle_peer_cancel(&mut self) {
        match self.state {
            TransferState::Completed => debug!("cancel after completion, ignoring"),
            TransferState::Cancelled | TransferState::Failed => {}
            _ => {
                info!("transfer cancelled by sender");
                self.state = TransferState::Cancelled;
                self.abort_sink().await;
                self.events.emit(TransferEvent::Cancelled);
            }
        }
    }
}

impl<K: ByteSink, T: Transport> Session for ReceiverSession<K, T> {
    fn state(&self) -> TransferState {
        self.state
    }

    fn is_finished(&self) -> bool {
        self.state.is_terminal() && !self.cancel_unsent
    }

    async fn on_open(&mut self, peer_id: String) -> Result<(), TransferError> {
        self.open = true;
        info!(peer = %peer_id, "transport open");
        self.events.emit(TransferEvent::Open { peer_id });

        match self.state {
            TransferState::Idle => {
                self.state = TransferState::AwaitingMeta;
                self.events.emit(TransferEvent::Connected);
            }
            TransferState::Cancelled => {
                self.cancel_unsent = false;
                send_cancel_best_effort(&self.transport).await;
            }
            state => warn!(?state, "transport reopened, ignoring"),
        }
        Ok(())
    }

    async fn on_message(&mut self, message: WireMessage) -> Result<(), TransferError> {
        if self.state.is_terminal() {
            if let WireMessage::Control(ControlMessage::Cancel) = message {
                self.handle_peer_cancel().await;
            } else {
                trace!(state = ?self.state, "message after terminal state, ignoring");
            }
            return Ok(());
        }

        match message {
            WireMessage::Data(chunk) => self.handle_chunk(chunk).await,
            WireMessage::Control(ControlMessage::Start { meta }) => self.handle_start(meta).await,
            WireMessage::Control(ControlMessage::Cancel) => {
                self.handle_peer_cancel().await;
                Ok(())
            }
            WireMessage::Control(other) => {
                warn!(message = other.message_type().as_str(), "unexpected control message, ignoring");
                Ok(())
            }
        }
    }

    async fn on_transport_lost(&mut self) {
        self.open = false;
        self.cancel_unsent = false;
        self.events.emit(TransferEvent::Disconnected);
        if !self.state.is_terminal() {
            self.fail(TransferError::Transport(TransportError::Closed)).await;
        }
    }

    async fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        info!("cancelling transfer");
        self.state = TransferState::Cancelled;
        if self.open {
            send_cancel_best_effort(&self.transport).await;
        } else {
            self.cancel_unsent = true;
        }
        self.abort_sink().await;
        self.events.emit(TransferEvent::Cancelled);
    }

    async fn fail(&mut self, error: TransferError) {
        warn!(state = ?self.state, "receiver failed: {error}");
        self.events.emit(TransferEvent::Error(error.to_string()));
        if self.state.is_terminal() {
            return;
        }
        self.state = TransferState::Failed;
        if self.open {
            send_cancel_best_effort(&self.transport).await;
        }
        self.abort_sink().await;
    }
}
