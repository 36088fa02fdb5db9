//! Windowed transfer-rate measurement.

use std::time::Duration;

use tokio::time::Instant;

/// Window used when none is configured.
pub const DEFAULT_SPEED_WINDOW: Duration = Duration::from_secs(1);

/// Averages a byte counter over fixed windows.
///
/// The rate is only recomputed once a full window has elapsed since the last
/// recomputation, so readers see a stable value between windows instead of
/// per-chunk jitter. Uses `tokio::time::Instant` so paused-clock tests can
/// drive it.
#[derive(Debug, Clone)]
pub struct SpeedMeter {
    window: Duration,
    window_start: Instant,
    window_start_bytes: u64,
    bytes_per_sec: u64,
}

impl SpeedMeter {
    /// Create a meter with the given window, starting now at zero bytes.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.max(Duration::from_millis(1)),
            window_start: Instant::now(),
            window_start_bytes: 0,
            bytes_per_sec: 0,
        }
    }

    /// Record the running byte total; returns `true` when the rate was recomputed.
    pub fn record(&mut self, total_bytes: u64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.window_start);
        if elapsed < self.window {
            return false;
        }

        let delta_bytes = total_bytes.saturating_sub(self.window_start_bytes);
        let elapsed_ms = elapsed.as_millis().max(1);
        let rate = u128::from(delta_bytes) * 1000 / elapsed_ms;
        self.bytes_per_sec = u64::try_from(rate).unwrap_or(u64::MAX);

        self.window_start = now;
        self.window_start_bytes = total_bytes;
        true
    }

    /// Last computed rate in bytes per second.
    #[must_use]
    pub const fn bytes_per_sec(&self) -> u64 {
        self.bytes_per_sec
    }

    /// Forget the rate and start a fresh window at `total_bytes`.
    pub fn reset(&mut self, total_bytes: u64) {
        self.window_start = Instant::now();
        self.window_start_bytes = total_bytes;
        self.bytes_per_sec = 0;
    }
}

impl Default for SpeedMeter {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED_WINDOW)
    }
}
