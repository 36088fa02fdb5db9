//! Transfer events - discriminated union for all transfer lifecycle changes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::state::TransferState;
use super::types::{TransferId, TransferKind};

/// Single discriminated union for all transfer events.
///
/// Serialized with a `type` tag so UI adapters can switch on it:
///
/// ```text
/// { "type": "added", "id": "...", "kind": "http", "display_name": "..." }
/// { "type": "state_changed", "id": "...", "state": "downloading" }
/// { "type": "completed", "id": "...", "path": "..." }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    /// A transfer was registered.
    Added {
        /// Identity key.
        id: TransferId,
        /// Transport.
        kind: TransferKind,
        /// Human-readable name.
        display_name: String,
    },

    /// A transfer moved to a new state.
    StateChanged {
        /// Identity key.
        id: TransferId,
        /// The new state.
        state: TransferState,
    },

    /// An HTTP transfer completed (the completion listener hook).
    Completed {
        /// Identity key.
        id: TransferId,
        /// Final location of the data.
        path: PathBuf,
    },

    /// A download finished and should be announced to the user.
    DownloadFinished {
        /// Human-readable name.
        display_name: String,
        /// Final location of the data.
        path: PathBuf,
    },

    /// A transfer was unregistered.
    Removed {
        /// Identity key.
        id: TransferId,
    },

    /// The pending-review counter changed.
    ReviewCountChanged {
        /// The new count.
        count: u32,
    },
}

impl TransferEvent {
    /// The transfer this event concerns, if any.
    #[must_use]
    pub const fn transfer_id(&self) -> Option<&TransferId> {
        match self {
            Self::Added { id, .. }
            | Self::StateChanged { id, .. }
            | Self::Completed { id, .. }
            | Self::Removed { id } => Some(id),
            Self::DownloadFinished { .. } | Self::ReviewCountChanged { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged() {
        let event = TransferEvent::StateChanged {
            id: TransferId::from_url("http://a/b"),
            state: TransferState::Complete,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"state_changed\""));
        assert!(json.contains("\"state\":\"complete\""));
    }

    #[test]
    fn transfer_id_accessor() {
        let id = TransferId::from_url("http://a/b");
        assert_eq!(
            TransferEvent::Removed { id: id.clone() }.transfer_id(),
            Some(&id)
        );
        assert!(
            TransferEvent::ReviewCountChanged { count: 1 }
                .transfer_id()
                .is_none()
        );
    }
}
