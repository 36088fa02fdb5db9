//! Runtime preferences consulted by the transfer manager.
//!
//! Keys are typed and carry their own defaults, so a store that has never
//! been written to still answers every query.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A preference the transfer manager reads or reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    /// Keep seeding torrents after they finish downloading.
    SeedFinishedTorrents,
    /// Only seed finished torrents while on wifi.
    SeedFinishedTorrentsWifiOnly,
    /// Allow BitTorrent traffic over mobile data.
    UseMobileData,
    /// Engine download rate limit in bytes/s (0 = unlimited).
    MaxDownloadSpeed,
    /// Engine upload rate limit in bytes/s (0 = unlimited).
    MaxUploadSpeed,
    /// Maximum concurrently active torrent downloads.
    MaxDownloads,
    /// Maximum concurrently seeding torrents.
    MaxUploads,
    /// Maximum connections across all torrents.
    MaxTotalConnections,
    /// Maximum connections per torrent.
    MaxTorrentConnections,
}

impl SettingKey {
    /// Every key, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::SeedFinishedTorrents,
        Self::SeedFinishedTorrentsWifiOnly,
        Self::UseMobileData,
        Self::MaxDownloadSpeed,
        Self::MaxUploadSpeed,
        Self::MaxDownloads,
        Self::MaxUploads,
        Self::MaxTotalConnections,
        Self::MaxTorrentConnections,
    ];

    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SeedFinishedTorrents => "seed_finished_torrents",
            Self::SeedFinishedTorrentsWifiOnly => "seed_finished_torrents_wifi_only",
            Self::UseMobileData => "use_mobile_data",
            Self::MaxDownloadSpeed => "max_download_speed",
            Self::MaxUploadSpeed => "max_upload_speed",
            Self::MaxDownloads => "max_downloads",
            Self::MaxUploads => "max_uploads",
            Self::MaxTotalConnections => "max_total_connections",
            Self::MaxTorrentConnections => "max_torrent_connections",
        }
    }

    /// The value used when nothing has been stored.
    #[must_use]
    pub const fn default_value(self) -> SettingValue {
        match self {
            Self::SeedFinishedTorrents => SettingValue::Bool(true),
            Self::SeedFinishedTorrentsWifiOnly | Self::UseMobileData => SettingValue::Bool(false),
            Self::MaxDownloadSpeed
            | Self::MaxUploadSpeed
            | Self::MaxDownloads
            | Self::MaxUploads
            | Self::MaxTotalConnections
            | Self::MaxTorrentConnections => SettingValue::Int(0),
        }
    }

    /// The engine tunable this key controls, if it is one.
    #[must_use]
    pub const fn engine_setting(self) -> Option<EngineSetting> {
        match self {
            Self::MaxDownloadSpeed => Some(EngineSetting::DownloadRateLimit),
            Self::MaxUploadSpeed => Some(EngineSetting::UploadRateLimit),
            Self::MaxDownloads => Some(EngineSetting::ActiveDownloads),
            Self::MaxUploads => Some(EngineSetting::ActiveSeeds),
            Self::MaxTotalConnections => Some(EngineSetting::ConnectionsLimit),
            Self::MaxTorrentConnections => Some(EngineSetting::MaxPeerListSize),
            Self::SeedFinishedTorrents
            | Self::SeedFinishedTorrentsWifiOnly
            | Self::UseMobileData => None,
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored preference value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// A flag.
    Bool(bool),
    /// A numeric tunable.
    Int(i64),
}

impl SettingValue {
    /// The flag, or `None` for numeric values.
    #[must_use]
    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            Self::Int(_) => None,
        }
    }

    /// The number, or `None` for flags.
    #[must_use]
    pub const fn as_i64(self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(i),
            Self::Bool(_) => None,
        }
    }
}

/// Engine-side tunables that preferences are forwarded to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineSetting {
    /// Global download rate limit.
    DownloadRateLimit,
    /// Global upload rate limit.
    UploadRateLimit,
    /// Maximum active downloads.
    ActiveDownloads,
    /// Maximum active seeds.
    ActiveSeeds,
    /// Global connection limit.
    ConnectionsLimit,
    /// Per-torrent peer limit.
    MaxPeerListSize,
}
