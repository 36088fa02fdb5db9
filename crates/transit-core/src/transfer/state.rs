//! Shared transfer state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a transfer, shared by every transport.
///
/// The HTTP engine walks the core machine:
///
/// ```text
/// Waiting → Downloading → Uncompressing → Complete
///              │   ↑            │
///              │   └ (retry) ───┼──→ Error
///              └────────────────┴──→ Cancelled
/// ```
///
/// `Complete`, `Error` and `Cancelled` are terminal. The remaining variants
/// are only ever mirrored from the BitTorrent engine or reported by peer
/// uploads; they are not validated by [`TransferState::can_transition_to`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    /// Created, or sleeping before a (re)try.
    Waiting,
    /// Bytes are flowing in.
    Downloading,
    /// Payload received, archive being extracted.
    Uncompressing,
    /// Finished successfully.
    Complete,
    /// Failed; the partial data has been discarded.
    Error,
    /// Removed by the user before completion.
    Cancelled,
    /// Engine is verifying pieces on disk.
    Checking,
    /// Engine is resolving torrent metadata (magnet or remote .torrent).
    DownloadingMetadata,
    /// Complete and serving data to other peers.
    Seeding,
    /// Paused by the user or by policy.
    Paused,
    /// Engine finished the download and is not seeding.
    Finished,
    /// A peer is pulling a file from us.
    Uploading,
}

impl TransferState {
    /// Whether no transition may leave this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Cancelled)
    }

    /// Whether the HTTP state machine permits `self → next`.
    ///
    /// `Downloading → Waiting` is only taken by the retry path.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Downloading | Self::Cancelled)
                | (
                    Self::Downloading,
                    Self::Waiting
                        | Self::Uncompressing
                        | Self::Complete
                        | Self::Error
                        | Self::Cancelled
                )
                | (Self::Uncompressing, Self::Complete | Self::Error | Self::Cancelled)
        )
    }

    /// Whether data is currently being received.
    #[must_use]
    pub const fn is_downloading(self) -> bool {
        matches!(self, Self::Downloading | Self::DownloadingMetadata)
    }

    /// Whether data is currently being sent.
    #[must_use]
    pub const fn is_uploading(self) -> bool {
        matches!(self, Self::Seeding | Self::Uploading)
    }

    /// Stable string form (used in logs and summaries).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Downloading => "downloading",
            Self::Uncompressing => "uncompressing",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Checking => "checking",
            Self::DownloadingMetadata => "downloading_metadata",
            Self::Seeding => "seeding",
            Self::Paused => "paused",
            Self::Finished => "finished",
            Self::Uploading => "uploading",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_exits() {
        let all = [
            TransferState::Waiting,
            TransferState::Downloading,
            TransferState::Uncompressing,
            TransferState::Complete,
            TransferState::Error,
            TransferState::Cancelled,
        ];
        for from in [
            TransferState::Complete,
            TransferState::Error,
            TransferState::Cancelled,
        ] {
            assert!(from.is_terminal());
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn happy_path_is_allowed() {
        assert!(TransferState::Waiting.can_transition_to(TransferState::Downloading));
        assert!(TransferState::Downloading.can_transition_to(TransferState::Uncompressing));
        assert!(TransferState::Uncompressing.can_transition_to(TransferState::Complete));
        assert!(TransferState::Downloading.can_transition_to(TransferState::Complete));
    }

    #[test]
    fn short_circuits() {
        assert!(TransferState::Downloading.can_transition_to(TransferState::Error));
        assert!(TransferState::Waiting.can_transition_to(TransferState::Cancelled));
        assert!(TransferState::Downloading.can_transition_to(TransferState::Cancelled));
        assert!(!TransferState::Waiting.can_transition_to(TransferState::Complete));
        assert!(!TransferState::Waiting.can_transition_to(TransferState::Uncompressing));
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&TransferState::DownloadingMetadata).unwrap();
        assert_eq!(json, "\"downloading_metadata\"");
        assert_eq!(TransferState::Seeding.to_string(), "seeding");
    }
}
