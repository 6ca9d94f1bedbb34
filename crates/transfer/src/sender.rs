//! Sending role: answers block requests from the receiver.

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use peerdrop_protocol::{ControlMessage, FileMeta, TransferState, WireMessage};

use crate::TransferError;
use crate::chunked::ChunkPlanner;
use crate::progress::RateEstimator;
use crate::session::Session;
use crate::source::ByteSource;
use crate::transport::{
    Transport, TransportError, send_cancel_best_effort, send_control, send_message,
};
use crate::types::{EventSink, SessionCounters, TransferEvent};

/// Sender state machine: `Idle → Connected → Transferring → {Completed,
/// Cancelled, Failed}`.
///
/// The session becomes `Completed` as soon as every byte has been sent and
/// stays there: a later `Cancel` from either side is ignored. It reports
/// [`TransferEvent::Completed`] once, when the receiver confirms with
/// `Completed{}`, when a straggling request arrives after the last block, or
/// when the owner or the transport ends the session first.
pub struct SenderSession<S, T> {
    source: S,
    transport: T,
    events: EventSink,
    planner: ChunkPlanner,
    state: TransferState,
    counters: SessionCounters,
    rate: RateEstimator,
    /// Most recently served block, kept for repeated requests.
    last_block: Option<(u64, Bytes)>,
    completion_reported: bool,
    open: bool,
    /// Cancelled before the transport opened; the peer is told on open.
    cancel_unsent: bool,
}

impl<S: ByteSource, T: Transport> SenderSession<S, T> {
    pub fn new(source: S, transport: T, events: EventSink) -> Self {
        Self::with_planner(source, transport, events, ChunkPlanner::default())
    }

    /// Uses a custom chunk geometry. Both peers must agree on it.
    pub fn with_planner(source: S, transport: T, events: EventSink, planner: ChunkPlanner) -> Self {
        let counters = SessionCounters {
            total_chunks: planner.total_chunks(source.meta().size),
            ..SessionCounters::default()
        };
        Self {
            source,
            transport,
            events,
            planner,
            state: TransferState::Idle,
            counters,
            rate: RateEstimator::new(planner.block_size()),
            last_block: None,
            completion_reported: false,
            open: false,
            cancel_unsent: false,
        }
    }

    pub fn meta(&self) -> &FileMeta {
        self.source.meta()
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    fn emit_completed(&mut self) {
        if self.completion_reported {
            return;
        }
        self.completion_reported = true;
        info!(file = %self.meta().name, bytes = self.counters.bytes_transferred, "transfer completed");
        self.events.emit(TransferEvent::Completed(self.source.artifact()));
    }

    async fn handle_request(&mut self, index: u64) -> Result<(), TransferError> {
        match self.state {
            TransferState::Cancelled | TransferState::Failed => {
                debug!(index, state = ?self.state, "ignoring request");
                return Ok(());
            }
            TransferState::Completed => {
                debug!(index, "request after last block, re-acknowledging");
                send_control(&self.transport, ControlMessage::Completed).await?;
                self.emit_completed();
                return Ok(());
            }
            _ => {}
        }

        let size = self.meta().size;
        let Some((start, end)) = self.planner.clamped_block_range(index, size) else {
            warn!(index, size, "request past end of file, ignoring");
            return Ok(());
        };
        self.state = TransferState::Transferring;

        let cached = self
            .last_block
            .as_ref()
            .filter(|(cached, _)| *cached == index)
            .map(|(_, block)| block.clone());
        let block = match cached {
            Some(block) => block,
            None => {
                let block = self.source.read_range(start, end).await?;
                self.last_block = Some((index, block.clone()));
                block
            }
        };

        for chunk in self.planner.split_into_chunks(block.clone()) {
            trace!(index, len = chunk.len(), "sending chunk");
            send_message(&self.transport, &WireMessage::Data(chunk)).await?;
        }

        if index >= self.counters.current_block_index {
            self.counters.bytes_transferred += block.len() as u64;
            self.counters.current_block_index = index + 1;
        } else {
            debug!(index, "re-sent an earlier block");
        }
        debug!(index, bytes = block.len(), total = self.counters.bytes_transferred, "block sent");

        if let Some(rate) = self.rate.sample() {
            self.events.emit(TransferEvent::TransferRate(rate));
        }
        self.events.emit(TransferEvent::Progress {
            transferred: self.counters.bytes_transferred,
            total: size,
        });

        if self.counters.bytes_transferred == size {
            info!(file = %self.meta().name, "all blocks sent, awaiting confirmation");
            self.state = TransferState::Completed;
        }
        Ok(())
    }

    fn handle_peer_cancel(&mut self) {
        match self.state {
            TransferState::Cancelled | TransferState::Failed => {}
            TransferState::Completed => {
                debug!("cancel after the last block, completion stands");
                self.emit_completed();
            }
            _ => {
                info!(file = %self.meta().name, "transfer cancelled by receiver");
                self.state = TransferState::Cancelled;
                self.events.emit(TransferEvent::Cancelled);
            }
        }
    }
}

impl<S: ByteSource, T: Transport> Session for SenderSession<S, T> {
    fn state(&self) -> TransferState {
        self.state
    }

    fn is_finished(&self) -> bool {
        match self.state {
            TransferState::Completed => self.completion_reported,
            TransferState::Cancelled => !self.cancel_unsent,
            state => state.is_terminal(),
        }
    }

    async fn on_open(&mut self, peer_id: String) -> Result<(), TransferError> {
        self.open = true;
        info!(peer = %peer_id, "transport open");
        self.events.emit(TransferEvent::Open { peer_id });

        if self.state == TransferState::Cancelled {
            self.cancel_unsent = false;
            send_cancel_best_effort(&self.transport).await;
            return Ok(());
        }
        if self.state != TransferState::Idle {
            warn!(state = ?self.state, "transport reopened, ignoring");
            return Ok(());
        }

        self.state = TransferState::Connected;
        self.events.emit(TransferEvent::Connected);

        let meta = self.meta().clone();
        info!(file = %meta.name, size = meta.size, "offering file");
        send_control(&self.transport, ControlMessage::Start { meta }).await?;
        self.rate.reset();

        if self.meta().size == 0 {
            self.state = TransferState::Completed;
        }
        Ok(())
    }

    async fn on_message(&mut self, message: WireMessage) -> Result<(), TransferError> {
        match message {
            WireMessage::Control(ControlMessage::Request { index }) => self.handle_request(index).await,
            WireMessage::Control(ControlMessage::Cancel) => {
                self.handle_peer_cancel();
                Ok(())
            }
            WireMessage::Control(ControlMessage::Completed) => {
                if self.state == TransferState::Completed {
                    self.emit_completed();
                } else {
                    warn!(state = ?self.state, "unexpected completion from receiver");
                }
                Ok(())
            }
            WireMessage::Control(ControlMessage::Start { .. }) => {
                warn!("sender received file:start, ignoring");
                Ok(())
            }
            WireMessage::Data(bytes) => {
                warn!(len = bytes.len(), "sender received data, ignoring");
                Ok(())
            }
        }
    }

    async fn on_transport_lost(&mut self) {
        self.open = false;
        self.cancel_unsent = false;
        self.events.emit(TransferEvent::Disconnected);
        match self.state {
            // Every byte went out over an ordered, reliable channel.
            TransferState::Completed => self.emit_completed(),
            TransferState::Cancelled | TransferState::Failed => {}
            _ => self.fail(TransferError::Transport(TransportError::Closed)).await,
        }
    }

    async fn cancel(&mut self) {
        match self.state {
            TransferState::Cancelled | TransferState::Failed => return,
            TransferState::Completed => {
                info!(file = %self.meta().name, "every byte already sent, cancel ignored");
                self.emit_completed();
                return;
            }
            _ => {}
        }
        info!(file = %self.meta().name, "cancelling transfer");
        self.state = TransferState::Cancelled;
        if self.open {
            send_cancel_best_effort(&self.transport).await;
        } else {
            self.cancel_unsent = true;
        }
        self.events.emit(TransferEvent::Cancelled);
    }

    async fn fail(&mut self, error: TransferError) {
        warn!(state = ?self.state, "sender failed: {error}");
        self.events.emit(TransferEvent::Error(error.to_string()));
        if self.state.is_terminal() {
            return;
        }
        self.state = TransferState::Failed;
        if self.open {
            send_cancel_best_effort(&self.transport).await;
        }
    }
}
