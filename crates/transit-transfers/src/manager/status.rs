use serde::Serialize;

/// Aggregate engine and transfer status, as printed by `transit status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    /// The BitTorrent engine is running.
    pub started: bool,
    /// The BitTorrent engine cannot accept incoming connections.
    pub firewalled: bool,
    /// Total download rate in bytes per second.
    pub downloads_bandwidth: u64,
    /// Total upload rate in bytes per second.
    pub uploads_bandwidth: u64,
    pub active_downloads: usize,
    pub active_uploads: usize,
    pub downloads_to_review: u32,
}
