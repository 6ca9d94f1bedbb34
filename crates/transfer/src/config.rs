//! Session driver configuration.

use std::time::Duration;

/// Default time a session keeps draining its transport after reaching a
/// terminal state, so a just-queued `Cancel` or `Completed` gets flushed.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(1);

/// Knobs for [`run_session`](crate::run_session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Linger after a terminal state before the driver returns.
    pub cancel_grace: Duration,
    /// Fail the session when the peer stays silent this long. `None` disables
    /// the watchdog and a stalled peer simply never advances.
    pub stall_timeout: Option<Duration>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            cancel_grace: DEFAULT_CANCEL_GRACE,
            stall_timeout: None,
        }
    }
}

impl TransferConfig {
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = Some(timeout);
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }
}
