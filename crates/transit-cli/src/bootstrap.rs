//! CLI bootstrap - the composition root.
//!
//! The only place concrete adapters are chosen. The CLI has no BitTorrent
//! engine, no media library and no connectivity oracle, so those ports get
//! their no-op or fixed implementations; HTTP goes through `reqwest`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use transit_core::ports::{
    BroadcastTransferEmitter, FixedConnectivity, InMemorySettingsStore, NoopLibraryIndexer,
    NoopTorrentEngine,
};
use transit_http::{HttpFetcherConfig, ReqwestFetcher};
use transit_transfers::{TransferManager, TransferManagerConfig, TransferManagerDeps};

use crate::commands::Cli;

/// Events buffered per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 256;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub save_directory: PathBuf,
    pub fetch_timeout: Duration,
    pub max_http_retries: u32,
}

impl CliConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            save_directory: cli
                .save_dir
                .clone()
                .unwrap_or_else(default_save_directory),
            fetch_timeout: Duration::from_secs(cli.timeout.max(1)),
            max_http_retries: cli.max_retries,
        }
    }
}

/// `~/Downloads/transit`, falling back to the home directory, then `.`.
pub fn default_save_directory() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("transit")
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    pub manager: Arc<TransferManager>,
    /// Subscribe here for transfer events.
    pub events: BroadcastTransferEmitter,
}

/// Wire a transfer manager for one CLI invocation.
///
/// Must be called from within the Tokio runtime.
pub fn bootstrap(config: &CliConfig) -> Result<CliContext> {
    let fetcher = ReqwestFetcher::new(&HttpFetcherConfig::default())
        .context("Failed to initialise the HTTP client")?;
    let events = BroadcastTransferEmitter::new(EVENT_CAPACITY);

    let manager = TransferManager::new(TransferManagerDeps {
        fetcher: Arc::new(fetcher),
        engine: Arc::new(NoopTorrentEngine),
        indexer: Arc::new(NoopLibraryIndexer),
        connectivity: Arc::new(FixedConnectivity::wifi()),
        settings: Arc::new(InMemorySettingsStore::new()),
        emitter: Arc::new(events.clone()),
        config: TransferManagerConfig::new(config.save_directory.clone())
            .with_fetch_timeout(config.fetch_timeout)
            .with_max_http_retries(config.max_http_retries),
    });
    manager.start();

    tracing::debug!(save_dir = %config.save_directory.display(), "CLI context ready");
    Ok(CliContext {
        manager: Arc::new(manager),
        events,
    })
}
