//! Reconnection policy with exponential backoff.
//!
//! The transfer core never reconnects: a session whose transport drops fails.
//! Owners that want another attempt establish a fresh channel here and start
//! a new session on it.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use peerdrop_transfer::TransportEvent;

use crate::error::ChannelError;
use crate::ws::WsTransport;

/// Backoff configuration for establishing a channel.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
    /// Give up after this many failed attempts. `None` retries until cancelled.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
            max_attempts: Some(10),
        }
    }
}

impl ReconnectConfig {
    /// Calculates the delay after a given failed attempt (1-based),
    /// with ±25% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        let jitter = capped * 0.25;
        let offset = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / u32::MAX as f64)
            * 2.0
            - 1.0; // [-1.0, 1.0)
        let with_jitter = (capped + jitter * offset).max(0.05);
        Duration::from_secs_f64(with_jitter)
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

/// Runs `attempt` until it succeeds, the attempts run out, or `cancel` fires.
///
/// `attempt` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &ReconnectConfig,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T, ChannelError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ChannelError>>,
{
    let mut n: u32 = 0;
    loop {
        n += 1;
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(ChannelError::Cancelled),
            r = attempt(n) => r,
        };
        let err = match result {
            Ok(value) => {
                if n > 1 {
                    info!(attempt = n, "connected after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if config.exhausted(n) {
            warn!(attempts = n, "giving up: {err}");
            return Err(ChannelError::RetriesExhausted {
                attempts: n,
                last: Box::new(err),
            });
        }

        let delay = config.delay_for_attempt(n);
        debug!(attempt = n, ?delay, "connect failed, retrying: {err}");
        tokio::select! {
            _ = cancel.cancelled() => return Err(ChannelError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Connects a [`WsTransport`] to `url`, retrying per `config`.
pub async fn connect_with_retry(
    url: &str,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Result<(WsTransport, mpsc::Receiver<TransportEvent>), ChannelError> {
    retry_with_backoff(config, cancel, |_| WsTransport::connect(url)).await
}
