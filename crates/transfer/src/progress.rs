use std::time::Instant;

use peerdrop_protocol::BLOCK_SIZE;

// ---------------------------------------------------------------------------
// RateEstimator
// ---------------------------------------------------------------------------

/// Estimates throughput from the spacing of block boundaries.
///
/// Every sample assumes exactly one full block moved since the previous one,
/// so the estimator must be sampled once per block boundary.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    block_bytes: u64,
    previous: Option<Instant>,
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new(BLOCK_SIZE as u64)
    }
}

impl RateEstimator {
    /// Creates an estimator for blocks of `block_bytes` bytes.
    pub fn new(block_bytes: u64) -> Self {
        Self {
            block_bytes,
            previous: None,
        }
    }

    /// Records a block boundary now and returns bytes/second, if a baseline exists.
    pub fn sample(&mut self) -> Option<f64> {
        self.sample_at(Instant::now())
    }

    /// Records a block boundary at `now`.
    ///
    /// The first call only stores the baseline. A zero interval yields no
    /// sample and keeps the previous baseline.
    pub fn sample_at(&mut self, now: Instant) -> Option<f64> {
        let Some(previous) = self.previous else {
            self.previous = Some(now);
            return None;
        };
        let elapsed = now.saturating_duration_since(previous);
        if elapsed.is_zero() {
            return None;
        }
        self.previous = Some(now);
        Some(self.block_bytes as f64 / elapsed.as_secs_f64())
    }

    /// Forgets the baseline.
    pub fn reset(&mut self) {
        self.previous = None;
    }
}
