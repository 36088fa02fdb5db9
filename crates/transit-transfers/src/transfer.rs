//! The `Transfer` sum type.
//!
//! Every registry collection stores `Transfer` values. Operations common to
//! all transports are dispatched with an exhaustive `match`, so adding a
//! variant forces every call site to decide what it means for it.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use transit_core::transfer::{
    Eta, TransferId, TransferItem, TransferKind, TransferState, TransferSummary,
};

use crate::bittorrent::{BittorrentDownload, TorrentFetcherDownload};
use crate::http::HttpDownload;
use crate::manager::registry::Collection;
use crate::upload::PeerHttpUpload;

/// Any tracked transfer.
#[derive(Clone, Debug)]
pub enum Transfer {
    /// HTTP download (cloud links, slides, streaming media) or peer download.
    Http(Arc<HttpDownload>),
    /// Engine-owned torrent.
    Bittorrent(Arc<BittorrentDownload>),
    /// `.torrent` still being fetched.
    TorrentFetcher(Arc<TorrentFetcherDownload>),
    /// File being served to a peer.
    PeerUpload(Arc<PeerHttpUpload>),
}

impl Transfer {
    pub fn id(&self) -> TransferId {
        match self {
            Self::Http(t) => t.id().clone(),
            Self::Bittorrent(t) => t.id().clone(),
            Self::TorrentFetcher(t) => t.id().clone(),
            Self::PeerUpload(t) => t.id().clone(),
        }
    }

    pub fn kind(&self) -> TransferKind {
        match self {
            Self::Http(t) => t.kind(),
            Self::Bittorrent(_) | Self::TorrentFetcher(_) => TransferKind::Bittorrent,
            Self::PeerUpload(_) => TransferKind::PeerUpload,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Self::Http(t) => t.display_name().to_string(),
            Self::Bittorrent(t) => t.display_name(),
            Self::TorrentFetcher(t) => t.display_name().to_string(),
            Self::PeerUpload(t) => t.display_name().to_string(),
        }
    }

    pub fn state(&self) -> TransferState {
        match self {
            Self::Http(t) => t.state(),
            Self::Bittorrent(t) => t.state(),
            Self::TorrentFetcher(t) => t.state(),
            Self::PeerUpload(t) => t.state(),
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Self::Http(t) => t.size(),
            Self::Bittorrent(t) => t.size(),
            Self::TorrentFetcher(t) => t.size(),
            Self::PeerUpload(t) => t.size(),
        }
    }

    pub fn bytes_received(&self) -> u64 {
        match self {
            Self::Http(t) => t.bytes_received(),
            Self::Bittorrent(t) => t.bytes_received(),
            Self::TorrentFetcher(_) | Self::PeerUpload(_) => 0,
        }
    }

    pub fn bytes_sent(&self) -> u64 {
        match self {
            Self::Bittorrent(t) => t.bytes_sent(),
            Self::PeerUpload(t) => t.bytes_sent(),
            Self::Http(_) | Self::TorrentFetcher(_) => 0,
        }
    }

    /// Bytes per second.
    pub fn download_speed(&self) -> u64 {
        match self {
            Self::Http(t) => t.download_speed(),
            Self::Bittorrent(t) => t.download_speed(),
            Self::TorrentFetcher(_) | Self::PeerUpload(_) => 0,
        }
    }

    /// Bytes per second.
    pub fn upload_speed(&self) -> u64 {
        match self {
            Self::Bittorrent(t) => t.upload_speed(),
            Self::PeerUpload(t) => t.upload_speed(),
            Self::Http(_) | Self::TorrentFetcher(_) => 0,
        }
    }

    /// Percentage complete (0-100).
    pub fn progress(&self) -> u8 {
        match self {
            Self::Http(t) => t.progress(),
            Self::Bittorrent(t) => t.progress(),
            Self::TorrentFetcher(_) => 0,
            Self::PeerUpload(t) => t.progress(),
        }
    }

    pub fn eta(&self) -> Eta {
        match self {
            Self::Http(t) => t.eta(),
            Self::Bittorrent(t) => t.eta(),
            Self::TorrentFetcher(_) => Eta::Infinite,
            Self::PeerUpload(t) => {
                Eta::from_progress(t.size(), t.bytes_sent(), t.upload_speed())
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            Self::Http(t) => t.is_complete(),
            Self::Bittorrent(t) => t.is_complete(),
            Self::TorrentFetcher(t) => t.is_complete(),
            Self::PeerUpload(t) => t.is_complete(),
        }
    }

    pub fn is_downloading(&self) -> bool {
        match self {
            Self::Http(t) => t.is_downloading(),
            Self::Bittorrent(t) => t.is_downloading(),
            Self::TorrentFetcher(t) => t.is_downloading(),
            Self::PeerUpload(_) => false,
        }
    }

    /// Seeding (torrents) or serving (peer uploads).
    pub fn is_uploading(&self) -> bool {
        match self {
            Self::Bittorrent(t) => t.is_seeding(),
            Self::PeerUpload(t) => t.is_uploading(),
            Self::Http(_) | Self::TorrentFetcher(_) => false,
        }
    }

    pub fn created(&self) -> DateTime<Utc> {
        match self {
            Self::Http(t) => t.created(),
            Self::Bittorrent(t) => t.created(),
            Self::TorrentFetcher(t) => t.created(),
            Self::PeerUpload(t) => t.created(),
        }
    }

    pub fn save_path(&self) -> PathBuf {
        match self {
            Self::Http(t) => t.final_path(),
            Self::Bittorrent(t) => t.save_path(),
            Self::TorrentFetcher(t) => t.torrent_path().to_path_buf(),
            Self::PeerUpload(t) => t.save_path().to_path_buf(),
        }
    }

    /// Files of multi-file transfers (selected torrent files); empty otherwise.
    pub fn items(&self) -> Vec<TransferItem> {
        match self {
            Self::Bittorrent(t) => t.items(),
            Self::Http(_) | Self::TorrentFetcher(_) | Self::PeerUpload(_) => Vec::new(),
        }
    }

    /// Stop and unregister. Torrents keep their `.torrent`; data is deleted on request.
    pub fn remove(&self, delete_data: bool) {
        match self {
            Self::Http(t) => t.remove(delete_data),
            Self::Bittorrent(t) => {
                // Failure is logged and pins the torrent in Error
                let _ = t.remove(false, delete_data);
            }
            Self::TorrentFetcher(t) => t.remove(),
            Self::PeerUpload(t) => t.remove(),
        }
    }

    /// Point-in-time serializable view.
    pub fn summary(&self) -> TransferSummary {
        TransferSummary {
            id: self.id(),
            kind: self.kind(),
            display_name: self.display_name(),
            state: self.state(),
            size: self.size(),
            bytes_received: self.bytes_received(),
            bytes_sent: self.bytes_sent(),
            download_speed: self.download_speed(),
            upload_speed: self.upload_speed(),
            progress: self.progress(),
            eta: self.eta(),
            complete: self.is_complete(),
            created: self.created(),
            save_path: self.save_path(),
        }
    }

    /// The registry collection this transfer lives in.
    pub(crate) const fn collection(&self) -> Collection {
        match self {
            Self::Http(_) => Collection::Downloads,
            Self::Bittorrent(_) | Self::TorrentFetcher(_) => Collection::Bittorrent,
            Self::PeerUpload(_) => Collection::Uploads,
        }
    }

    /// Address of the underlying transfer, for identity checks on unregister.
    pub(crate) fn addr(&self) -> *const () {
        match self {
            Self::Http(t) => t.addr(),
            Self::Bittorrent(t) => t.addr(),
            Self::TorrentFetcher(t) => t.addr(),
            Self::PeerUpload(t) => t.addr(),
        }
    }
}
