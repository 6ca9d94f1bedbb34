//! Lifecycle driver shared by both roles.
//!
//! A transport delivers [`TransportEvent`]s one at a time; [`run_session`]
//! feeds them to a [`Session`] in order, wires owner cancellation and the
//! optional stall watchdog, and lingers briefly once the session is finished
//! so a just-queued `Cancel` or `Completed` can flush before teardown.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use peerdrop_protocol::{TransferState, WireMessage};

use crate::TransferError;
use crate::config::TransferConfig;
use crate::transport::{TransportError, TransportEvent};

/// One role of a transfer, bound to one transport channel.
///
/// Handlers run to completion before the next event is delivered; the only
/// suspension points are transport sends and byte source/sink I/O.
pub trait Session: Send {
    fn state(&self) -> TransferState;

    /// Whether the driver may stop feeding events once the grace delay ends.
    fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// The transport is open towards `peer_id`.
    fn on_open(&mut self, peer_id: String) -> impl Future<Output = Result<(), TransferError>> + Send;

    /// One decoded message from the peer.
    fn on_message(
        &mut self,
        message: WireMessage,
    ) -> impl Future<Output = Result<(), TransferError>> + Send;

    /// The transport closed or dropped. Nothing can be sent any more.
    fn on_transport_lost(&mut self) -> impl Future<Output = ()> + Send;

    /// Owner-initiated cancel. An incomplete session becomes `Cancelled` now
    /// and tells the peer best-effort, once the transport is open.
    fn cancel(&mut self) -> impl Future<Output = ()> + Send;

    /// Surfaces `error` and moves a non-terminal session to `Failed`.
    fn fail(&mut self, error: TransferError) -> impl Future<Output = ()> + Send;
}

/// Drives `session` until it is finished and the grace delay has passed, or
/// until the transport goes away. Returns the final state.
pub async fn run_session<S: Session>(
    mut session: S,
    mut inbound: mpsc::Receiver<TransportEvent>,
    cancel: CancellationToken,
    config: TransferConfig,
) -> TransferState {
    let mut cancel_seen = false;
    let mut linger_until: Option<Instant> = None;

    loop {
        if session.is_finished() && linger_until.is_none() {
            debug!(state = ?session.state(), grace = ?config.cancel_grace, "session finished, lingering");
            linger_until = Some(Instant::now() + config.cancel_grace);
        }
        let watchdog = config.stall_timeout.filter(|_| {
            !matches!(
                session.state(),
                TransferState::Idle | TransferState::Cancelled | TransferState::Failed
            ) && !session.is_finished()
        });

        tokio::select! {
            biased;

            _ = cancel.cancelled(), if !cancel_seen => {
                cancel_seen = true;
                if !session.is_finished() {
                    info!("transfer cancelled by owner");
                    session.cancel().await;
                }
            }

            _ = sleep_until(linger_until.unwrap_or_else(Instant::now)), if linger_until.is_some() => {
                break;
            }

            _ = sleep(watchdog.unwrap_or_default()), if watchdog.is_some() => {
                let timeout = watchdog.unwrap_or_default();
                warn!(?timeout, "peer stalled");
                session.fail(TransferError::Stalled(timeout)).await;
            }

            event = inbound.recv() => match event {
                Some(TransportEvent::Open { peer_id }) => {
                    if let Err(e) = session.on_open(peer_id).await {
                        session.fail(e).await;
                    }
                }
                Some(TransportEvent::Data(frame)) => {
                    let result = match WireMessage::from_frame(frame) {
                        Ok(message) => session.on_message(message).await,
                        Err(e) => Err(e.into()),
                    };
                    if let Err(e) = result {
                        session.fail(e).await;
                    }
                }
                Some(TransportEvent::Error(message)) => {
                    warn!(%message, "transport error");
                    session
                        .fail(TransferError::Transport(TransportError::Other(message)))
                        .await;
                }
                Some(TransportEvent::Closed) | Some(TransportEvent::Disconnected) | None => {
                    debug!(state = ?session.state(), "transport gone");
                    session.on_transport_lost().await;
                    break;
                }
            },
        }
    }

    let state = session.state();
    info!(?state, "session ended");
    state
}

/// A session running on its own task.
#[derive(Debug)]
pub struct TransferHandle {
    cancel: CancellationToken,
    join: JoinHandle<TransferState>,
}

impl TransferHandle {
    /// Requests cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the session task and returns its final state.
    pub async fn join(self) -> Result<TransferState, JoinError> {
        self.join.await
    }
}

/// Spawns [`run_session`] on the current runtime.
pub fn spawn_session<S>(
    session: S,
    inbound: mpsc::Receiver<TransportEvent>,
    config: TransferConfig,
) -> TransferHandle
where
    S: Session + 'static,
{
    let cancel = CancellationToken::new();
    let join = tokio::spawn(run_session(session, inbound, cancel.clone(), config));
    TransferHandle { cancel, join }
}
