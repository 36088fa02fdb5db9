//! Point-in-time views of a transfer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::state::TransferState;
use super::types::{TransferId, TransferKind};

/// Estimated time remaining.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eta {
    /// Seconds left (0 when the size is unknown).
    Seconds(u64),
    /// Nothing is flowing, so the transfer will never finish at this rate.
    Infinite,
}

impl Eta {
    /// Compute the ETA from the remaining bytes and the current speed.
    #[must_use]
    pub fn from_progress(size: u64, received: u64, speed_bps: u64) -> Self {
        if size == 0 {
            return Self::Seconds(0);
        }
        if speed_bps == 0 {
            return Self::Infinite;
        }
        Self::Seconds(size.saturating_sub(received) / speed_bps)
    }
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => f.write_str("∞"),
            Self::Seconds(s) => write!(f, "{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60),
        }
    }
}

/// Serializable snapshot of any transfer, for status output and UIs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSummary {
    /// Identity key.
    pub id: TransferId,
    /// Transport.
    pub kind: TransferKind,
    /// Human-readable name.
    pub display_name: String,
    /// Current state.
    pub state: TransferState,
    /// Size in bytes (0 when unknown).
    pub size: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Download speed in bytes per second.
    pub download_speed: u64,
    /// Upload speed in bytes per second.
    pub upload_speed: u64,
    /// Percentage complete (0-100).
    pub progress: u8,
    /// Estimated time remaining.
    pub eta: Eta,
    /// Whether the transfer is done (complete or errored).
    pub complete: bool,
    /// When the transfer was created.
    pub created: DateTime<Utc>,
    /// Where the data lives on disk.
    pub save_path: PathBuf,
}
