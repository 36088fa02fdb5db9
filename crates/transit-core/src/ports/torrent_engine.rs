//! BitTorrent engine port.
//!
//! The engine is an external collaborator that owns the actual downloads.
//! The transfer manager only ever talks to it through these traits: it asks
//! the engine to start downloads, and the engine reports back through
//! unbounded channels that the manager and its adapters consume on their own
//! tasks.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;

use crate::settings::EngineSetting;
use crate::transfer::{
    Eta, TorrentCrawledSearchResult, TransferError, TransferItem, TransferState,
};

/// Notification about a single engine download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TorrentDownloadEvent {
    /// Metadata or file selection changed; refresh any cached snapshot.
    Update,
    /// Every selected file has been downloaded.
    Finished,
    /// The engine dropped the download; these files were never completed.
    Removed {
        /// Absolute paths of incomplete files left on disk.
        incomplete_files: Vec<PathBuf>,
    },
}

/// Engine-wide notification.
pub enum EngineEvent {
    /// A download was added (new or restored).
    DownloadAdded(Arc<dyn TorrentHandle>),
}

impl fmt::Debug for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DownloadAdded(handle) => f
                .debug_tuple("DownloadAdded")
                .field(&handle.info_hash())
                .finish(),
        }
    }
}

/// One download owned by the engine.
///
/// Every accessor reads the engine's live state; callers that need a stable
/// view cache what they read.
pub trait TorrentHandle: Send + Sync {
    /// Hex info-hash.
    fn info_hash(&self) -> String;
    /// Torrent name.
    fn display_name(&self) -> String;
    /// Directory the torrent's files are saved under.
    fn save_path(&self) -> PathBuf;
    /// When the download was added.
    fn created(&self) -> DateTime<Utc>;
    /// Total size of every file in the torrent.
    fn size(&self) -> u64;
    /// All files in the torrent, with skipped ones flagged.
    fn items(&self) -> Vec<TransferItem>;
    /// Whether only some files are selected.
    fn is_partial(&self) -> bool;

    /// Engine-reported state.
    fn state(&self) -> TransferState;
    /// Bytes downloaded.
    fn bytes_received(&self) -> u64;
    /// Bytes uploaded.
    fn bytes_sent(&self) -> u64;
    /// Download rate in bytes/s.
    fn download_speed(&self) -> u64;
    /// Upload rate in bytes/s.
    fn upload_speed(&self) -> u64;
    /// Engine-computed time remaining.
    fn eta(&self) -> Eta;
    /// Percentage complete (0-100).
    fn progress(&self) -> u8;

    /// Connected peers.
    fn connected_peers(&self) -> u32;
    /// Known peers.
    fn total_peers(&self) -> u32;
    /// Connected seeds.
    fn connected_seeds(&self) -> u32;
    /// Known seeds.
    fn total_seeds(&self) -> u32;

    /// Paused by the user or by policy.
    fn is_paused(&self) -> bool;
    /// Uploading after finishing.
    fn is_seeding(&self) -> bool;
    /// All selected files are present.
    fn is_finished(&self) -> bool;
    /// Finished and verified.
    fn is_complete(&self) -> bool;
    /// Actively downloading.
    fn is_downloading(&self) -> bool;
    /// Actively uploading.
    fn is_uploading(&self) -> bool;

    /// Pause the download.
    fn pause(&self);
    /// Resume the download.
    fn resume(&self);
    /// Drop the download from the engine, optionally deleting its files.
    fn remove(&self, delete_torrent: bool, delete_data: bool) -> Result<(), TransferError>;

    /// Route this download's notifications into `tx`.
    fn set_listener(&self, tx: UnboundedSender<TorrentDownloadEvent>);
}

/// The BitTorrent engine.
#[async_trait]
pub trait TorrentEnginePort: Send + Sync {
    /// Start (or re-select files of) the torrent stored at `path`.
    fn download_torrent_file(
        &self,
        path: &Path,
        selection: Option<&[bool]>,
    ) -> Result<(), TransferError>;

    /// Start the torrent described by raw `.torrent` bytes.
    fn download_torrent_bytes(
        &self,
        bytes: &[u8],
        selection: Option<&[bool]>,
    ) -> Result<(), TransferError>;

    /// Re-submit a torrent the engine already knows with a new file selection.
    fn download_existing(
        &self,
        info_hash: &str,
        selection: Option<&[bool]>,
    ) -> Result<(), TransferError>;

    /// Start a single file of a crawled torrent.
    fn download_crawled(&self, result: &TorrentCrawledSearchResult) -> Result<(), TransferError>;

    /// Resolve a magnet link to `.torrent` bytes, giving up after `timeout`.
    async fn fetch_magnet(&self, uri: &str, timeout: Duration) -> Result<Vec<u8>, TransferError>;

    /// Re-add every download persisted from a previous session.
    ///
    /// Each one is announced through [`EngineEvent::DownloadAdded`].
    fn restore_downloads(&self);

    /// Look up a download by info-hash.
    fn find_torrent(&self, info_hash: &str) -> Option<Arc<dyn TorrentHandle>>;

    /// Route engine-wide notifications into `tx`.
    fn set_listener(&self, tx: UnboundedSender<EngineEvent>);

    /// Aggregate download rate in bytes/s.
    fn download_rate(&self) -> u64;
    /// Aggregate upload rate in bytes/s.
    fn upload_rate(&self) -> u64;

    /// Apply a tunable.
    fn set_setting(&self, setting: EngineSetting, value: i64);

    /// Whether the engine session is running.
    fn is_started(&self) -> bool;
    /// Whether incoming connections appear to be blocked.
    fn is_firewalled(&self) -> bool;
}

/// An engine that has no torrents and refuses to start any.
///
/// Lets HTTP-only setups (like the CLI) build a transfer manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTorrentEngine;

impl NoopTorrentEngine {
    fn unavailable() -> TransferError {
        TransferError::engine("BitTorrent engine is not available")
    }
}

#[async_trait]
impl TorrentEnginePort for NoopTorrentEngine {
    fn download_torrent_file(
        &self,
        _path: &Path,
        _selection: Option<&[bool]>,
    ) -> Result<(), TransferError> {
        Err(Self::unavailable())
    }

    fn download_torrent_bytes(
        &self,
        _bytes: &[u8],
        _selection: Option<&[bool]>,
    ) -> Result<(), TransferError> {
        Err(Self::unavailable())
    }

    fn download_existing(
        &self,
        _info_hash: &str,
        _selection: Option<&[bool]>,
    ) -> Result<(), TransferError> {
        Err(Self::unavailable())
    }

    fn download_crawled(&self, _result: &TorrentCrawledSearchResult) -> Result<(), TransferError> {
        Err(Self::unavailable())
    }

    async fn fetch_magnet(&self, _uri: &str, _timeout: Duration) -> Result<Vec<u8>, TransferError> {
        Err(Self::unavailable())
    }

    fn restore_downloads(&self) {}

    fn find_torrent(&self, _info_hash: &str) -> Option<Arc<dyn TorrentHandle>> {
        None
    }

    fn set_listener(&self, _tx: UnboundedSender<EngineEvent>) {}

    fn download_rate(&self) -> u64 {
        0
    }

    fn upload_rate(&self) -> u64 {
        0
    }

    fn set_setting(&self, _setting: EngineSetting, _value: i64) {}

    fn is_started(&self) -> bool {
        false
    }

    fn is_firewalled(&self) -> bool {
        false
    }
}
