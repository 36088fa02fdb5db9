//! Files being served to peers.
//!
//! The serving HTTP handler asks the manager for a [`PeerHttpUpload`], then
//! reports each chunk it writes and finally marks the upload complete or
//! failed. Progress and speed are tracked the same way as HTTP downloads.

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use transit_core::transfer::types::percent;
use transit_core::transfer::{FileDescriptor, TransferEvent, TransferId, TransferState};

use crate::context::TransferContext;
use crate::http::SpeedMeter;
use crate::manager::registry::Collection;

struct Status {
    state: TransferState,
    bytes_sent: u64,
    speed: SpeedMeter,
}

/// One file being pulled from us by a peer.
pub struct PeerHttpUpload {
    id: TransferId,
    fd: FileDescriptor,
    peer_address: String,
    created: DateTime<Utc>,
    status: Mutex<Status>,
    ctx: TransferContext,
}

impl PeerHttpUpload {
    pub(crate) fn new(ctx: TransferContext, fd: FileDescriptor, peer_address: String) -> Arc<Self> {
        let speed = SpeedMeter::new(ctx.config.speed_window);
        Arc::new(Self {
            id: TransferId::new(uuid::Uuid::new_v4().to_string()),
            fd,
            peer_address,
            created: Utc::now(),
            status: Mutex::new(Status {
                state: TransferState::Uploading,
                bytes_sent: 0,
                speed,
            }),
            ctx,
        })
    }

    /// Record `len` more bytes written to the peer.
    ///
    /// Returns `Break` once the upload was removed, telling the handler to
    /// stop serving.
    pub fn add_bytes_sent(&self, len: usize) -> ControlFlow<()> {
        let mut status = self.lock();
        if status.state != TransferState::Uploading {
            return ControlFlow::Break(());
        }
        status.bytes_sent += len as u64;
        let total = status.bytes_sent;
        status.speed.record(total);
        ControlFlow::Continue(())
    }

    /// The whole file was served.
    pub fn complete(&self) {
        self.finish(TransferState::Complete);
    }

    /// Serving stopped because of an error.
    pub fn fail(&self) {
        self.finish(TransferState::Error);
    }

    fn finish(&self, state: TransferState) {
        {
            let mut status = self.lock();
            if status.state != TransferState::Uploading {
                return;
            }
            status.state = state;
            let total = status.bytes_sent;
            status.speed.reset(total);
        }
        tracing::info!(
            target: "transit.transfers",
            id = %self.id,
            peer = %self.peer_address,
            state = %state,
            "Peer upload finished"
        );
        self.ctx.emitter.emit(TransferEvent::StateChanged {
            id: self.id.clone(),
            state,
        });
    }

    /// Stop serving (if still uploading) and unregister.
    pub fn remove(&self) {
        let cancelled = {
            let mut status = self.lock();
            let uploading = status.state == TransferState::Uploading;
            if uploading {
                status.state = TransferState::Cancelled;
            }
            uploading
        };
        if cancelled {
            self.ctx.emitter.emit(TransferEvent::StateChanged {
                id: self.id.clone(),
                state: TransferState::Cancelled,
            });
        }
        self.ctx.unregister(Collection::Uploads, &self.id, self.addr());
    }

    fn lock(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn addr(&self) -> *const () {
        std::ptr::from_ref(self).cast()
    }

    /// Generated upload id.
    pub const fn id(&self) -> &TransferId {
        &self.id
    }

    /// The file being served.
    pub const fn file_descriptor(&self) -> &FileDescriptor {
        &self.fd
    }

    /// Address of the requesting peer.
    pub fn peer_address(&self) -> &str {
        &self.peer_address
    }

    pub fn display_name(&self) -> &str {
        &self.fd.title
    }

    /// Local path of the file being served.
    pub fn save_path(&self) -> &Path {
        &self.fd.file_path
    }

    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub const fn size(&self) -> u64 {
        self.fd.file_size
    }

    pub fn state(&self) -> TransferState {
        self.lock().state
    }

    pub fn bytes_sent(&self) -> u64 {
        self.lock().bytes_sent
    }

    /// Windowed average in bytes/s; 0 unless uploading.
    pub fn upload_speed(&self) -> u64 {
        let status = self.lock();
        if status.state == TransferState::Uploading {
            status.speed.bytes_per_sec()
        } else {
            0
        }
    }

    pub fn progress(&self) -> u8 {
        let status = self.lock();
        if status.state == TransferState::Complete {
            100
        } else {
            percent(status.bytes_sent, self.fd.file_size).min(99)
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(
            self.state(),
            TransferState::Complete | TransferState::Error
        )
    }

    pub fn is_uploading(&self) -> bool {
        self.state() == TransferState::Uploading
    }
}

impl std::fmt::Debug for PeerHttpUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerHttpUpload")
            .field("id", &self.id)
            .field("peer", &self.peer_address)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
