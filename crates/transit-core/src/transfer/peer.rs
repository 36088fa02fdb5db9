//! Peers and the files they share.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A device on the local network running the file-sharing HTTP server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Host name or IP address.
    pub address: String,
    /// Port of the peer's HTTP server.
    pub port: u16,
    /// Name the peer announces itself with.
    #[serde(default)]
    pub nickname: String,
}

impl Peer {
    /// Create a peer without a nickname.
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            nickname: String::new(),
        }
    }
}

/// A shared file as advertised by a peer (or served by us).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Library id of the file on the serving side.
    pub id: u64,
    /// Library file-type code (audio, video, document, ...).
    pub file_type: u8,
    /// Human-readable title.
    pub title: String,
    /// Path of the file on the serving side.
    pub file_path: PathBuf,
    /// Size in bytes.
    pub file_size: u64,
}

impl FileDescriptor {
    /// The bare file name, falling back to the title.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map_or_else(|| self.title.clone(), |n| n.to_string_lossy().into_owned())
    }

    /// URL of this file on `peer`'s HTTP server.
    #[must_use]
    pub fn download_url(&self, peer: &Peer) -> String {
        format!(
            "http://{}:{}/download?type={}&id={}",
            peer.address, peer.port, self.file_type, self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fd() -> FileDescriptor {
        FileDescriptor {
            id: 42,
            file_type: 1,
            title: "A Song".into(),
            file_path: PathBuf::from("/sdcard/Music/song.mp3"),
            file_size: 1_000,
        }
    }

    #[test]
    fn download_url_points_at_peer_server() {
        let peer = Peer::new("192.168.1.20", 55_555);
        assert_eq!(
            fd().download_url(&peer),
            "http://192.168.1.20:55555/download?type=1&id=42"
        );
    }

    #[test]
    fn file_name_prefers_path() {
        assert_eq!(fd().file_name(), "song.mp3");
        let mut untitled = fd();
        untitled.file_path = PathBuf::new();
        assert_eq!(untitled.file_name(), "A Song");
    }
}
