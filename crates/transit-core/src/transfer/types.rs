//! Core domain types for transfers.
//!
//! Pure data types with no I/O dependencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Per-file download selection for a torrent (`true` = download the file).
pub type FileSelection = Vec<bool>;

/// Identity of a transfer (its "details key").
///
/// HTTP transfers are keyed by their source URL, BitTorrent transfers by
/// their info-hash (stored lower-case so lookups are case-insensitive), and
/// peer uploads by a generated id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(String);

impl TransferId {
    /// Create an id from an arbitrary key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Create the id of a URL-addressed transfer.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Create the id of a BitTorrent transfer.
    #[must_use]
    pub fn from_info_hash(info_hash: &str) -> Self {
        Self(info_hash.trim().to_ascii_lowercase())
    }

    /// Borrow the raw key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The transport behind a transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    /// Plain HTTP fetch (cloud links, slides, streaming media).
    Http,
    /// BitTorrent download driven by the engine.
    Bittorrent,
    /// A local file being served to a peer.
    PeerUpload,
    /// A file being pulled from a peer's HTTP server.
    PeerDownload,
}

impl TransferKind {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Bittorrent => "bittorrent",
            Self::PeerUpload => "peer_upload",
            Self::PeerDownload => "peer_download",
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable descriptor of an HTTP resource to download.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpDownloadLink {
    /// Source URL.
    pub url: String,
    /// File name to save as (inside the save directory).
    pub file_name: String,
    /// Human-readable name.
    pub display_name: String,
    /// Expected size in bytes, 0 when unknown.
    pub size: u64,
    /// Whether the payload is a zip archive to extract on completion.
    pub compressed: bool,
}

impl HttpDownloadLink {
    /// Create a link; the display name defaults to the file name.
    pub fn new(url: impl Into<String>, file_name: impl Into<String>, size: u64) -> Self {
        let file_name = file_name.into();
        Self {
            url: url.into(),
            display_name: file_name.clone(),
            file_name,
            size,
            compressed: false,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Mark the payload as a zip archive.
    #[must_use]
    pub const fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }
}

/// One file inside a multi-file transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    /// File name.
    pub name: String,
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Bytes downloaded so far.
    pub bytes_received: u64,
    /// Deselected by the user.
    pub skipped: bool,
}

impl TransferItem {
    /// Percentage downloaded (0-100).
    #[must_use]
    pub fn progress(&self) -> u8 {
        percent(self.bytes_received, self.size)
    }
}

/// Outcome of asking the manager to start a transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferResult {
    /// A transfer was created (or handed to the engine).
    Success,
    /// The same resource is already being downloaded.
    Duplicated,
    /// The transfer could not be created.
    Error,
}

/// Integer percentage of `part` in `whole`, clamped to 100; 0 when `whole` is 0.
#[must_use]
pub fn percent(part: u64, whole: u64) -> u8 {
    if whole == 0 {
        return 0;
    }
    let pct = u128::from(part) * 100 / u128::from(whole);
    #[allow(clippy::cast_possible_truncation)]
    let pct = pct.min(100) as u8;
    pct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_hash_ids_are_case_insensitive() {
        assert_eq!(
            TransferId::from_info_hash("ABCDEF0123"),
            TransferId::from_info_hash(" abcdef0123 ")
        );
    }

    #[test]
    fn url_ids_keep_their_key() {
        let id = TransferId::from_url("http://host/File.zip");
        assert_eq!(id.as_str(), "http://host/File.zip");
        assert_eq!(id.to_string(), "http://host/File.zip");
    }

    #[test]
    fn link_builder() {
        let link = HttpDownloadLink::new("http://host/a.zip", "a.zip", 10)
            .with_display_name("Slides")
            .with_compressed(true);
        assert_eq!(link.file_name, "a.zip");
        assert_eq!(link.display_name, "Slides");
        assert!(link.compressed);
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(50, 200), 25);
        assert_eq!(percent(300, 200), 100);
        assert_eq!(percent(u64::MAX, u64::MAX), 100);
    }

    #[test]
    fn item_progress() {
        let item = TransferItem {
            name: "a".into(),
            path: PathBuf::from("/tmp/a"),
            size: 4,
            bytes_received: 1,
            skipped: false,
        };
        assert_eq!(item.progress(), 25);
    }
}
