//! BitTorrent transfers.
//!
//! Torrents are owned by the external engine. [`BittorrentDownload`] is a
//! stateful proxy over one engine download: it caches a snapshot of the
//! torrent's name, size and selected files, and reacts to the engine's
//! per-download notifications on its own task. [`TorrentFetcherDownload`] is
//! the placeholder shown while a `.torrent` is still being fetched.

mod cleanup;
mod fetcher;

pub use fetcher::TorrentFetcherDownload;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use transit_core::ports::{TorrentDownloadEvent, TorrentHandle};
use transit_core::transfer::{
    Eta, TransferError, TransferEvent, TransferId, TransferItem, TransferState,
};

use crate::context::TransferContext;
use crate::manager::registry::Collection;

const LOG_TARGET: &str = "transit.transfers";

/// Locally cached view of engine state, refreshed on `Update` only.
#[derive(Debug, Clone)]
struct Snapshot {
    display_name: String,
    size: u64,
    items: Vec<TransferItem>,
}

impl Snapshot {
    fn of(handle: &dyn TorrentHandle) -> Self {
        let items: Vec<TransferItem> = handle
            .items()
            .into_iter()
            .filter(|item| !item.skipped)
            .collect();

        let total = handle.size();
        let size = if handle.is_partial() {
            let selected: u64 = items.iter().map(|item| item.size).sum();
            if selected > 0 { selected } else { total }
        } else {
            total
        };

        Self {
            display_name: handle.display_name(),
            size,
            items,
        }
    }
}

/// A torrent download owned by the engine.
pub struct BittorrentDownload {
    id: TransferId,
    handle: Arc<dyn TorrentHandle>,
    snapshot: RwLock<Snapshot>,
    errored: AtomicBool,
    /// Paused by connectivity or seeding policy rather than by the user.
    policy_paused: AtomicBool,
    ctx: TransferContext,
}

impl BittorrentDownload {
    /// Wrap `handle`, subscribe to its notifications and resume it.
    pub(crate) fn new(ctx: TransferContext, handle: Arc<dyn TorrentHandle>) -> Arc<Self> {
        let download = Arc::new(Self {
            id: TransferId::from_info_hash(&handle.info_hash()),
            snapshot: RwLock::new(Snapshot::of(handle.as_ref())),
            handle,
            errored: AtomicBool::new(false),
            policy_paused: AtomicBool::new(false),
            ctx,
        });

        let (tx, rx) = mpsc::unbounded_channel();
        download.handle.set_listener(tx);
        download.ctx.runtime.spawn(Self::listen(
            Arc::downgrade(&download),
            download.id.clone(),
            download.handle.save_path(),
            rx,
        ));

        download.handle.resume();
        download
    }

    /// Consume engine notifications until the engine drops the torrent.
    ///
    /// `Removed` usually arrives after a successful `remove` has unregistered
    /// and dropped the adapter, so its cleanup only needs the save path.
    async fn listen(
        this: Weak<Self>,
        id: TransferId,
        save_path: PathBuf,
        mut rx: mpsc::UnboundedReceiver<TorrentDownloadEvent>,
    ) {
        while let Some(event) = rx.recv().await {
            match event {
                TorrentDownloadEvent::Removed { incomplete_files } => {
                    tracing::debug!(
                        target: LOG_TARGET,
                        id = %id,
                        incomplete = incomplete_files.len(),
                        "Torrent removed by engine"
                    );
                    cleanup::final_cleanup(&incomplete_files, &save_path);
                    break;
                }
                TorrentDownloadEvent::Update => {
                    if let Some(download) = this.upgrade() {
                        download.refresh();
                    }
                }
                TorrentDownloadEvent::Finished => {
                    if let Some(download) = this.upgrade() {
                        download.on_finished();
                    }
                }
            }
        }
    }

    fn refresh(&self) {
        let snapshot = Snapshot::of(self.handle.as_ref());
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    fn on_finished(&self) {
        if !self.ctx.seeding_allowed() {
            tracing::debug!(target: LOG_TARGET, id = %self.id, "Seeding not allowed, pausing");
            self.pause_for_policy();
        }

        let display_name = self.display_name();
        tracing::info!(target: LOG_TARGET, id = %self.id, name = %display_name, "Torrent finished");

        self.ctx.increment_downloads_to_review();
        self.ctx
            .notify_download_finished(&display_name, &self.handle.save_path());
    }

    /// Remove from the engine; stays registered (in `Error`) if the engine refuses.
    pub fn remove(&self, delete_torrent: bool, delete_data: bool) -> Result<(), TransferError> {
        match self.handle.remove(delete_torrent, delete_data) {
            Ok(()) => {
                self.ctx
                    .unregister(Collection::Bittorrent, &self.id, self.addr());
                Ok(())
            }
            Err(err) => {
                tracing::warn!(target: LOG_TARGET, id = %self.id, error = %err, "Engine failed to remove torrent");
                if !self.errored.swap(true, Ordering::SeqCst) {
                    self.ctx.emitter.emit(TransferEvent::StateChanged {
                        id: self.id.clone(),
                        state: TransferState::Error,
                    });
                }
                Err(err)
            }
        }
    }

    pub(crate) fn addr(&self) -> *const () {
        std::ptr::from_ref(self).cast()
    }

    /// Identity (lower-case info-hash).
    pub const fn id(&self) -> &TransferId {
        &self.id
    }

    pub fn info_hash(&self) -> String {
        self.handle.info_hash()
    }

    /// Cached display name.
    pub fn display_name(&self) -> String {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .display_name
            .clone()
    }

    /// Cached size: the selected files' total for partial downloads.
    pub fn size(&self) -> u64 {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .size
    }

    /// Cached non-skipped files.
    pub fn items(&self) -> Vec<TransferItem> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .clone()
    }

    /// Engine state, pinned at `Error` once the engine has reported it or
    /// removal has failed.
    pub fn state(&self) -> TransferState {
        if self.errored.load(Ordering::SeqCst) {
            return TransferState::Error;
        }
        let state = self.handle.state();
        if state == TransferState::Error {
            self.errored.store(true, Ordering::SeqCst);
        }
        state
    }

    pub fn save_path(&self) -> PathBuf {
        self.handle.save_path()
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.handle.created()
    }

    pub fn bytes_received(&self) -> u64 {
        self.handle.bytes_received()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.handle.bytes_sent()
    }

    pub fn download_speed(&self) -> u64 {
        self.handle.download_speed()
    }

    pub fn upload_speed(&self) -> u64 {
        self.handle.upload_speed()
    }

    pub fn eta(&self) -> Eta {
        self.handle.eta()
    }

    pub fn progress(&self) -> u8 {
        self.handle.progress().min(100)
    }

    pub fn is_complete(&self) -> bool {
        self.handle.is_complete()
    }

    pub fn is_downloading(&self) -> bool {
        self.handle.is_downloading()
    }

    pub fn is_uploading(&self) -> bool {
        self.handle.is_uploading()
    }

    pub fn is_paused(&self) -> bool {
        self.handle.is_paused()
    }

    pub fn is_seeding(&self) -> bool {
        self.handle.is_seeding()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn connected_peers(&self) -> u32 {
        self.handle.connected_peers()
    }

    pub fn total_peers(&self) -> u32 {
        self.handle.total_peers()
    }

    pub fn connected_seeds(&self) -> u32 {
        self.handle.connected_seeds()
    }

    pub fn total_seeds(&self) -> u32 {
        self.handle.total_seeds()
    }

    /// Pause on the user's behalf; only an explicit `resume` restarts it.
    pub fn pause(&self) {
        self.policy_paused.store(false, Ordering::SeqCst);
        self.handle.pause();
    }

    pub fn resume(&self) {
        self.policy_paused.store(false, Ordering::SeqCst);
        self.handle.resume();
    }

    /// Pause because of network or seeding policy. A torrent the user already
    /// paused stays user-paused.
    pub(crate) fn pause_for_policy(&self) {
        if !self.handle.is_paused() {
            self.policy_paused.store(true, Ordering::SeqCst);
        }
        self.handle.pause();
    }

    /// Running, or paused only by policy.
    pub fn is_resumable(&self) -> bool {
        !self.handle.is_paused() || self.policy_paused.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for BittorrentDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BittorrentDownload")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
