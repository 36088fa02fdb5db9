//! Search results a transfer can be started from.
//!
//! The set of variants is closed: the manager matches on [`SearchResult`]
//! exhaustively, so adding a source forces every dispatch site to handle it.

use serde::{Deserialize, Serialize};

use super::types::{FileSelection, HttpDownloadLink};

/// A search hit pointing at a torrent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentSearchResult {
    /// Human-readable name.
    pub display_name: String,
    /// Page the hit was found on (de-duplication key).
    pub details_url: String,
    /// Where the `.torrent` (or magnet) can be fetched.
    pub torrent_url: String,
    /// Info-hash when the search source reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    /// Total size in bytes, 0 when unknown.
    pub size: u64,
    /// Files to download, all when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<FileSelection>,
}

impl TorrentSearchResult {
    /// The info-hash, if present and non-blank.
    #[must_use]
    pub fn info_hash(&self) -> Option<&str> {
        self.info_hash
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }
}

/// A single file inside an already-crawled torrent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentCrawledSearchResult {
    /// The torrent the file belongs to.
    pub torrent: TorrentSearchResult,
    /// Path of the file within the torrent.
    pub file_path: String,
    /// Index of the file within the torrent.
    pub file_index: usize,
    /// File size in bytes.
    pub size: u64,
}

/// A compressed slide/bundle served over HTTP.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSlideSearchResult {
    /// Page the hit was found on.
    pub details_url: String,
    /// The archive to download (normally `compressed`).
    pub link: HttpDownloadLink,
}

/// A streaming-media hit with a resolved direct stream URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingMediaSearchResult {
    /// Page the hit was found on.
    pub details_url: String,
    /// Human-readable title.
    pub display_name: String,
    /// Direct URL of the media stream.
    pub stream_url: String,
    /// File name to save as.
    pub file_name: String,
    /// Size in bytes, 0 when unknown.
    pub size: u64,
}

/// A generic file served over HTTP.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSearchResult {
    /// Page the hit was found on.
    pub details_url: String,
    /// Human-readable name.
    pub display_name: String,
    /// Direct download URL.
    pub download_url: String,
    /// File name to save as.
    pub file_name: String,
    /// Size in bytes, 0 when unknown.
    pub size: u64,
}

/// Every kind of search result the manager can download.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchResult {
    /// A torrent (fetched by hash or by URL).
    Torrent(TorrentSearchResult),
    /// One file of a crawled torrent, handed straight to the engine.
    TorrentCrawled(TorrentCrawledSearchResult),
    /// A compressed HTTP bundle.
    HttpSlide(HttpSlideSearchResult),
    /// A streaming-media file.
    StreamingMedia(StreamingMediaSearchResult),
    /// A plain HTTP file.
    Http(HttpSearchResult),
}

impl SearchResult {
    /// The details URL (de-duplication key) of the hit.
    #[must_use]
    pub fn details_url(&self) -> &str {
        match self {
            Self::Torrent(sr) => &sr.details_url,
            Self::TorrentCrawled(sr) => &sr.torrent.details_url,
            Self::HttpSlide(sr) => &sr.details_url,
            Self::StreamingMedia(sr) => &sr.details_url,
            Self::Http(sr) => &sr.details_url,
        }
    }

    /// The HTTP link to download, for HTTP-family results.
    #[must_use]
    pub fn http_link(&self) -> Option<HttpDownloadLink> {
        match self {
            Self::Torrent(_) | Self::TorrentCrawled(_) => None,
            Self::HttpSlide(sr) => Some(sr.link.clone()),
            Self::StreamingMedia(sr) => Some(
                HttpDownloadLink::new(&sr.stream_url, &sr.file_name, sr.size)
                    .with_display_name(&sr.display_name),
            ),
            Self::Http(sr) => Some(
                HttpDownloadLink::new(&sr.download_url, &sr.file_name, sr.size)
                    .with_display_name(&sr.display_name),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torrent() -> TorrentSearchResult {
        TorrentSearchResult {
            display_name: "ubuntu".into(),
            details_url: "http://tracker/details/1".into(),
            torrent_url: "http://tracker/1.torrent".into(),
            info_hash: Some("  ".into()),
            size: 0,
            selection: None,
        }
    }

    #[test]
    fn blank_info_hash_is_absent() {
        assert_eq!(torrent().info_hash(), None);
    }

    #[test]
    fn http_results_produce_links() {
        let sr = SearchResult::Http(HttpSearchResult {
            details_url: "http://site/page".into(),
            display_name: "Song".into(),
            download_url: "http://cdn/song.mp3".into(),
            file_name: "song.mp3".into(),
            size: 42,
        });
        let link = sr.http_link().unwrap();
        assert_eq!(link.url, "http://cdn/song.mp3");
        assert_eq!(link.display_name, "Song");
        assert!(!link.compressed);
        assert_eq!(sr.details_url(), "http://site/page");
    }

    #[test]
    fn torrents_have_no_http_link() {
        assert!(SearchResult::Torrent(torrent()).http_link().is_none());
    }
}
