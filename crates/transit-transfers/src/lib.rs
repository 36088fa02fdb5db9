//! Transfer lifecycle manager for transit.
//!
//! Tracks every in-flight and finished transfer (HTTP fetches, BitTorrent
//! downloads, peer uploads and downloads) behind one registry with uniform
//! progress, speed and removal semantics.
//!
//! # Modules
//!
//! - `http` - The HTTP download engine, its speed meter and zip extraction
//! - `bittorrent` - Adapter over engine-owned torrents and the `.torrent` fetcher
//! - `upload` - Files served to peers
//! - `transfer` - The `Transfer` sum type every collection stores
//! - `manager` - `TransferManager`: registry, bulk operations, policy reactions

// Re-export core types for convenience
pub use transit_core::transfer::{
    Eta, FileDescriptor, HttpDownloadLink, Peer, SearchResult, TransferError, TransferEvent,
    TransferId, TransferItem, TransferKind, TransferResult, TransferState, TransferSummary,
};

mod bittorrent;
mod config;
mod context;
mod http;
mod manager;
mod transfer;
mod upload;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use bittorrent::{BittorrentDownload, TorrentFetcherDownload};
pub use config::{DEFAULT_MAX_HTTP_RETRIES, TransferManagerConfig};
pub use http::{HttpDownload, SpeedMeter};
pub use manager::{ConnectivityMonitor, EngineStatus, TransferManager, TransferManagerDeps};
pub use transfer::Transfer;
pub use upload::PeerHttpUpload;

