//! Transfer manager configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Retries granted to an HTTP download the server answers 503 for.
pub const DEFAULT_MAX_HTTP_RETRIES: u32 = 3;

/// Configuration for creating a transfer manager.
///
/// Runtime preferences (seeding policy, engine tunables) live in the settings
/// store instead, because they change while the manager is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferManagerConfig {
    /// Directory HTTP and peer downloads are saved to.
    pub save_directory: PathBuf,
    /// Directory fetched `.torrent` files are saved to.
    pub torrents_directory: PathBuf,
    /// Per-attempt timeout handed to the fetcher.
    pub fetch_timeout: Duration,
    /// How long the engine may take to resolve a magnet link.
    pub magnet_timeout: Duration,
    /// Bound on server-directed (503 + `Retry-After`) retries.
    pub max_http_retries: u32,
    /// Minimum interval between download-speed recomputations.
    pub speed_window: Duration,
}

impl Default for TransferManagerConfig {
    fn default() -> Self {
        Self {
            save_directory: PathBuf::from("."),
            torrents_directory: PathBuf::from("./torrents"),
            fetch_timeout: Duration::from_secs(30),
            magnet_timeout: Duration::from_secs(90),
            max_http_retries: DEFAULT_MAX_HTTP_RETRIES,
            speed_window: Duration::from_secs(1),
        }
    }
}

impl TransferManagerConfig {
    /// Create a config saving into `save_directory` (torrents under `torrents/` inside it).
    #[must_use]
    pub fn new(save_directory: PathBuf) -> Self {
        Self {
            torrents_directory: save_directory.join("torrents"),
            save_directory,
            ..Default::default()
        }
    }

    /// Set the torrents directory.
    #[must_use]
    pub fn with_torrents_directory(mut self, dir: PathBuf) -> Self {
        self.torrents_directory = dir;
        self
    }

    /// Set the per-attempt fetch timeout.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the retry bound.
    #[must_use]
    pub const fn with_max_http_retries(mut self, retries: u32) -> Self {
        self.max_http_retries = retries;
        self
    }

    /// Set the speed window.
    #[must_use]
    pub const fn with_speed_window(mut self, window: Duration) -> Self {
        self.speed_window = window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_nests_torrents_directory() {
        let config = TransferManagerConfig::new(PathBuf::from("/data"));
        assert_eq!(config.torrents_directory, PathBuf::from("/data/torrents"));
        assert_eq!(config.max_http_retries, 3);
        assert_eq!(config.speed_window, Duration::from_secs(1));
    }

    #[test]
    fn builders_override_defaults() {
        let config = TransferManagerConfig::default()
            .with_max_http_retries(0)
            .with_fetch_timeout(Duration::from_secs(5));
        assert_eq!(config.max_http_retries, 0);
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
    }
}
