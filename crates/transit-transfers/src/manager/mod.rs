//! Transfer manager implementation.
//!
//! [`TransferManager`] owns the registry of every transfer and is the only
//! place transfers are created. It is fully synchronous from the caller's
//! point of view: transfers run on tasks spawned onto the runtime handle
//! captured at construction, so any thread (engine callback threads
//! included) may call into it.
//!
//! # Architecture
//!
//! - **Registry**: three insertion-ordered collections (HTTP downloads,
//!   uploads, torrents) plus the pending-review counter
//! - **Transfers**: hold a weak registry handle and unregister themselves
//! - **Background tasks**: the settings forwarder (`start`) and the engine
//!   listener (`load_torrents`), both aborted on drop
//!
//! # Concurrency Model
//!
//! - Collections are `RwLock<IndexMap>`; readers iterate cloned snapshots
//! - HTTP and torrent de-duplication run under one monitor so
//!   check-then-add is atomic
//! - No lock is held while calling into the engine or a transfer

mod connectivity;
mod preferences;
pub(crate) mod registry;
mod status;

pub use connectivity::ConnectivityMonitor;
pub use status::EngineStatus;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use transit_core::ports::{
    ConnectivityPort, EngineEvent, FetchPort, LibraryIndexerPort, SettingsStorePort,
    TorrentEnginePort, TransferEventEmitterPort,
};
use transit_core::transfer::{
    FileDescriptor, HttpDownloadLink, Peer, SearchResult, TorrentCrawledSearchResult,
    TorrentSearchResult, TransferError, TransferId, TransferResult, TransferState,
    TransferSummary,
};

use crate::bittorrent::{BittorrentDownload, TorrentFetcherDownload};
use crate::config::TransferManagerConfig;
use crate::context::TransferContext;
use crate::http::HttpDownload;
use crate::transfer::Transfer;
use crate::upload::PeerHttpUpload;

use registry::{Collection, Registry};

const LOG_TARGET: &str = "transit.transfers";

/// Engine-internal downloads created while resolving a magnet link.
const MAGNET_FETCH_PREFIX: &str = "fetchMagnet - ";

/// Dependencies for constructing a [`TransferManager`].
pub struct TransferManagerDeps {
    /// Streams HTTP resources to disk.
    pub fetcher: Arc<dyn FetchPort>,
    /// The BitTorrent engine.
    pub engine: Arc<dyn TorrentEnginePort>,
    /// Media library that indexes finished downloads.
    pub indexer: Arc<dyn LibraryIndexerPort>,
    /// Network state oracle.
    pub connectivity: Arc<dyn ConnectivityPort>,
    /// User preferences.
    pub settings: Arc<dyn SettingsStorePort>,
    /// Sink for lifecycle events.
    pub emitter: Arc<dyn TransferEventEmitterPort>,
    /// Directories, timeouts and retry bounds.
    pub config: TransferManagerConfig,
}

/// Central registry and factory for every transfer.
pub struct TransferManager {
    registry: Arc<Registry>,
    pub(crate) ctx: TransferContext,
    settings_task: Mutex<Option<JoinHandle<()>>>,
    engine_task: Mutex<Option<JoinHandle<()>>>,
}

impl TransferManager {
    /// Build a manager spawning onto the current Tokio runtime.
    ///
    /// Must be called from within a runtime context; use
    /// [`with_handle`](Self::with_handle) from plain threads.
    pub fn new(deps: TransferManagerDeps) -> Self {
        Self::with_handle(deps, Handle::current())
    }

    /// Build a manager spawning onto `runtime`.
    pub fn with_handle(deps: TransferManagerDeps, runtime: Handle) -> Self {
        let registry = Arc::new(Registry::new(Arc::clone(&deps.emitter)));
        let ctx = TransferContext {
            fetcher: deps.fetcher,
            engine: deps.engine,
            indexer: deps.indexer,
            connectivity: deps.connectivity,
            settings: deps.settings,
            emitter: deps.emitter,
            config: Arc::new(deps.config),
            runtime,
            registry: Arc::downgrade(&registry),
        };
        Self {
            registry,
            ctx,
            settings_task: Mutex::new(None),
            engine_task: Mutex::new(None),
        }
    }

    /// Start forwarding engine tunables from the settings store. Idempotent.
    pub fn start(&self) {
        let mut task = self
            .settings_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }
        let changes = self.ctx.settings.subscribe();
        *task = Some(self.ctx.runtime.spawn(preferences::forward_settings(
            changes,
            Arc::clone(&self.ctx.settings),
            Arc::clone(&self.ctx.engine),
        )));
        tracing::debug!(target: LOG_TARGET, "Transfer manager started");
    }

    /// The configuration transfers are created with.
    pub fn config(&self) -> &TransferManagerConfig {
        &self.ctx.config
    }

    // =========================================================================
    // Creating transfers
    // =========================================================================

    /// Start downloading a search hit.
    pub fn download(&self, sr: &SearchResult) -> TransferResult {
        match sr {
            SearchResult::Torrent(torrent) => self.download_torrent_result(torrent),
            SearchResult::TorrentCrawled(crawled) => self.download_crawled(crawled),
            SearchResult::HttpSlide(_) | SearchResult::StreamingMedia(_) | SearchResult::Http(_) => {
                match sr.http_link() {
                    Some(link) => {
                        self.download_http(TransferId::from_url(sr.details_url()), link)
                    }
                    None => TransferResult::Error,
                }
            }
        }
    }

    /// Download an HTTP resource keyed by `id`, unless one is already in flight.
    fn download_http(&self, id: TransferId, link: HttpDownloadLink) -> TransferResult {
        let download = {
            let _guard = self.registry.lock_dedup();
            if let Some(existing) = self.registry.get_in(Collection::Downloads, &id) {
                if is_in_flight(existing.state()) {
                    tracing::debug!(target: LOG_TARGET, id = %id, "Already downloading");
                    return TransferResult::Duplicated;
                }
            }
            let download = HttpDownload::new(self.ctx.clone(), id, link);
            self.registry.insert(Transfer::Http(Arc::clone(&download)));
            download
        };

        tracing::info!(
            target: LOG_TARGET,
            id = %download.id(),
            name = %download.display_name(),
            "Queued HTTP download"
        );
        download.start();
        TransferResult::Success
    }

    fn download_torrent_result(&self, sr: &TorrentSearchResult) -> TransferResult {
        let selection = sr.selection.as_deref();
        let _guard = self.registry.lock_dedup();

        if let Some(hash) = sr.info_hash() {
            let id = TransferId::from_info_hash(hash);
            if self.registry.contains(Collection::Bittorrent, &id) {
                tracing::debug!(target: LOG_TARGET, id = %id, "Torrent already registered");
                return TransferResult::Duplicated;
            }
            if self.ctx.engine.find_torrent(hash).is_some() {
                return match self.ctx.engine.download_existing(hash, selection) {
                    Ok(()) => TransferResult::Success,
                    Err(e) => {
                        tracing::warn!(target: LOG_TARGET, id = %id, error = %e, "Engine refused known torrent");
                        TransferResult::Error
                    }
                };
            }
        }

        self.start_torrent_fetch(
            &sr.torrent_url,
            &sr.display_name,
            sr.size,
            sr.selection.clone(),
        )
    }

    fn download_crawled(&self, sr: &TorrentCrawledSearchResult) -> TransferResult {
        match self.ctx.engine.download_crawled(sr) {
            Ok(()) => {
                tracing::info!(target: LOG_TARGET, file = %sr.file_path, "Crawled torrent file handed to engine");
                TransferResult::Success
            }
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, file = %sr.file_path, error = %e, "Engine refused crawled file");
                TransferResult::Error
            }
        }
    }

    /// Register and start a `.torrent` fetcher. Call with the de-dup monitor held.
    fn start_torrent_fetch(
        &self,
        uri: &str,
        display_name: &str,
        size: u64,
        selection: Option<Vec<bool>>,
    ) -> TransferResult {
        if self
            .registry
            .contains(Collection::Bittorrent, &TransferId::from_url(uri))
        {
            return TransferResult::Duplicated;
        }
        let fetcher =
            TorrentFetcherDownload::new(self.ctx.clone(), uri, display_name, size, selection);
        self.registry
            .insert(Transfer::TorrentFetcher(Arc::clone(&fetcher)));
        fetcher.start();
        TransferResult::Success
    }

    /// Start a torrent from a `file:`, `http(s):` or `magnet:` URI.
    ///
    /// Failures are logged, never propagated.
    pub fn download_torrent(&self, uri: &str) -> TransferResult {
        let url = match Url::parse(uri) {
            Ok(url) => url,
            Err(e) => {
                let err = TransferError::invalid_uri(uri, e.to_string());
                tracing::warn!(target: LOG_TARGET, error = %err, "Can't download torrent");
                return TransferResult::Error;
            }
        };

        match url.scheme() {
            "file" => {
                let Ok(path) = url.to_file_path() else {
                    let err = TransferError::invalid_uri(uri, "not a local path");
                    tracing::warn!(target: LOG_TARGET, error = %err, "Can't download torrent");
                    return TransferResult::Error;
                };
                match self.ctx.engine.download_torrent_file(&path, None) {
                    Ok(()) => TransferResult::Success,
                    Err(e) => {
                        tracing::warn!(target: LOG_TARGET, path = %path.display(), error = %e, "Engine refused torrent file");
                        TransferResult::Error
                    }
                }
            }
            "http" | "https" | "magnet" => {
                let _guard = self.registry.lock_dedup();
                self.start_torrent_fetch(uri, &uri_display_name(&url), 0, None)
            }
            scheme => {
                let err = TransferError::unsupported_scheme(scheme);
                tracing::warn!(target: LOG_TARGET, uri, error = %err, "Can't download torrent");
                TransferResult::Error
            }
        }
    }

    /// Pull `fd` from `peer`.
    ///
    /// Returns the transfer's id alongside the result, so a duplicate request
    /// can be pointed at the download already running.
    pub fn download_from_peer(&self, peer: &Peer, fd: &FileDescriptor) -> (TransferResult, TransferId) {
        let download = {
            let _guard = self.registry.lock_dedup();
            let id = TransferId::from_url(fd.download_url(peer));
            if let Some(existing) = self.registry.get_in(Collection::Downloads, &id) {
                if is_in_flight(existing.state()) {
                    return (TransferResult::Duplicated, id);
                }
            }
            let download = HttpDownload::peer(self.ctx.clone(), peer, fd);
            self.registry.insert(Transfer::Http(Arc::clone(&download)));
            download
        };

        tracing::info!(
            target: LOG_TARGET,
            id = %download.id(),
            peer = %peer.address,
            "Queued peer download"
        );
        download.start();
        (TransferResult::Success, download.id().clone())
    }

    /// Register a file being served to `peer_address`.
    pub fn upload(&self, fd: FileDescriptor, peer_address: impl Into<String>) -> Arc<PeerHttpUpload> {
        let upload = PeerHttpUpload::new(self.ctx.clone(), fd, peer_address.into());
        tracing::info!(
            target: LOG_TARGET,
            id = %upload.id(),
            peer = %upload.peer_address(),
            file = %upload.display_name(),
            "Serving file to peer"
        );
        self.registry
            .insert(Transfer::PeerUpload(Arc::clone(&upload)));
        upload
    }

    // =========================================================================
    // Engine
    // =========================================================================

    /// Rebuild the torrent collection from the engine.
    ///
    /// Clears the collection, installs the engine-wide listener (replacing
    /// any previous one) and asks the engine to restore its downloads; each
    /// restored download arrives as `DownloadAdded`.
    pub fn load_torrents(&self) {
        self.registry.clear_bittorrent();

        let (tx, rx) = mpsc::unbounded_channel();
        self.ctx.engine.set_listener(tx);

        let task = self
            .ctx
            .runtime
            .spawn(listen_engine(self.ctx.clone(), rx));
        if let Some(previous) = self
            .engine_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task)
        {
            previous.abort();
        }

        self.ctx.engine.restore_downloads();
    }

    /// Aggregate engine and transfer status.
    pub fn engine_status(&self) -> EngineStatus {
        EngineStatus {
            started: self.ctx.engine.is_started(),
            firewalled: self.ctx.engine.is_firewalled(),
            downloads_bandwidth: self.downloads_bandwidth(),
            uploads_bandwidth: self.uploads_bandwidth(),
            active_downloads: self.active_downloads(),
            active_uploads: self.active_uploads(),
            downloads_to_review: self.downloads_to_review(),
        }
    }

    /// Mobile network up and BitTorrent over mobile data disallowed.
    pub fn is_bittorrent_mobile_data_savings_on(&self) -> bool {
        self.ctx.mobile_data_savings_on()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Every transfer: HTTP downloads, then uploads, then torrents.
    pub fn transfers(&self) -> Vec<Transfer> {
        self.registry.all()
    }

    pub fn summaries(&self) -> Vec<TransferSummary> {
        self.transfers().iter().map(Transfer::summary).collect()
    }

    pub fn get(&self, id: &TransferId) -> Option<Transfer> {
        self.registry.get(id)
    }

    /// Remove the transfer registered under `id`. Returns whether one was found.
    pub fn remove(&self, id: &TransferId, delete_data: bool) -> bool {
        self.registry.get(id).is_some_and(|transfer| {
            transfer.remove(delete_data);
            true
        })
    }

    /// Transfers still downloading.
    pub fn active_downloads(&self) -> usize {
        self.registry
            .all()
            .iter()
            .filter(|t| !t.is_complete() && t.is_downloading())
            .count()
    }

    /// Transfers still uploading or seeding.
    pub fn active_uploads(&self) -> usize {
        self.registry
            .all()
            .iter()
            .filter(|t| !t.is_complete() && t.is_uploading())
            .count()
    }

    /// Total download rate in bytes per second.
    pub fn downloads_bandwidth(&self) -> u64 {
        let http: u64 = self
            .registry
            .snapshot(Collection::Downloads)
            .iter()
            .map(Transfer::download_speed)
            .sum();
        self.ctx.engine.download_rate().saturating_add(http)
    }

    /// Total upload rate in bytes per second.
    pub fn uploads_bandwidth(&self) -> u64 {
        let peers: u64 = self
            .registry
            .snapshot(Collection::Uploads)
            .iter()
            .map(Transfer::upload_speed)
            .sum();
        self.ctx.engine.upload_rate().saturating_add(peers)
    }

    // =========================================================================
    // Bulk operations
    // =========================================================================

    /// Remove every finished HTTP download and upload. Torrents are kept.
    pub fn clear_complete(&self) {
        for transfer in self
            .registry
            .snapshot(Collection::Downloads)
            .into_iter()
            .chain(self.registry.snapshot(Collection::Uploads))
        {
            if transfer.is_complete() {
                transfer.remove(false);
            }
        }
    }

    /// Cancel every unfinished HTTP download and peer upload.
    pub fn stop_http_transfers(&self) {
        for transfer in self.registry.snapshot(Collection::Downloads) {
            if !transfer.is_complete() && is_in_flight(transfer.state()) {
                transfer.remove(false);
            }
        }
        for transfer in self.registry.snapshot(Collection::Uploads) {
            if !transfer.is_complete() && transfer.is_uploading() {
                transfer.remove(false);
            }
        }
    }

    /// Pause every torrent; `resume_resumable_transfers` undoes this.
    pub fn pause_torrents(&self) {
        for torrent in self.torrents() {
            torrent.pause_for_policy();
        }
    }

    /// Resume every torrent the user has not paused.
    pub fn resume_resumable_transfers(&self) {
        for torrent in self.torrents() {
            if torrent.is_resumable() {
                torrent.resume();
            }
        }
    }

    /// Pause every seeding or complete torrent.
    pub fn stop_seeding_torrents(&self) {
        for torrent in self.torrents() {
            if torrent.is_seeding() || torrent.is_complete() {
                torrent.pause_for_policy();
            }
        }
    }

    fn torrents(&self) -> Vec<Arc<BittorrentDownload>> {
        self.registry
            .snapshot(Collection::Bittorrent)
            .into_iter()
            .filter_map(|transfer| match transfer {
                Transfer::Bittorrent(torrent) => Some(torrent),
                Transfer::Http(_) | Transfer::TorrentFetcher(_) | Transfer::PeerUpload(_) => None,
            })
            .collect()
    }

    // =========================================================================
    // Review counter
    // =========================================================================

    /// Finished downloads the user has not looked at yet.
    pub fn downloads_to_review(&self) -> u32 {
        self.registry.downloads_to_review()
    }

    pub fn increment_downloads_to_review(&self) {
        self.registry.increment_downloads_to_review();
    }

    pub fn clear_downloads_to_review(&self) {
        self.registry.clear_downloads_to_review();
    }
}

impl Drop for TransferManager {
    fn drop(&mut self) {
        for task in [&self.settings_task, &self.engine_task] {
            if let Some(handle) = task.lock().unwrap_or_else(PoisonError::into_inner).take() {
                handle.abort();
            }
        }
    }
}

impl std::fmt::Debug for TransferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferManager")
            .field("transfers", &self.registry.all().len())
            .field("downloads_to_review", &self.downloads_to_review())
            .finish_non_exhaustive()
    }
}

/// Wrap every download the engine announces, until the manager goes away.
async fn listen_engine(ctx: TransferContext, mut rx: mpsc::UnboundedReceiver<EngineEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            EngineEvent::DownloadAdded(handle) => {
                let name = handle.display_name();
                if name.starts_with(MAGNET_FETCH_PREFIX) {
                    tracing::trace!(target: LOG_TARGET, name = %name, "Skipping magnet fetch download");
                    continue;
                }
                let Some(registry) = ctx.registry.upgrade() else {
                    break;
                };
                let download = BittorrentDownload::new(ctx.clone(), handle);
                tracing::info!(target: LOG_TARGET, id = %download.id(), name = %name, "Torrent added");
                registry.insert(Transfer::Bittorrent(download));
            }
        }
    }
}

/// Waiting, downloading or extracting.
const fn is_in_flight(state: TransferState) -> bool {
    matches!(
        state,
        TransferState::Waiting | TransferState::Downloading | TransferState::Uncompressing
    )
}

/// Magnet `dn` parameter, else the last path segment, else the whole URI.
fn uri_display_name(url: &Url) -> String {
    if url.scheme() == "magnet" {
        if let Some((_, name)) = url.query_pairs().find(|(key, _)| key == "dn") {
            return name.into_owned();
        }
    }
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map_or_else(|| url.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnet_display_name_comes_from_dn() {
        let url = Url::parse("magnet:?xt=urn:btih:abc&dn=Ubuntu+24.04").unwrap();
        assert_eq!(uri_display_name(&url), "Ubuntu 24.04");
    }

    #[test]
    fn http_display_name_is_last_segment() {
        let url = Url::parse("https://host/files/debian.torrent").unwrap();
        assert_eq!(uri_display_name(&url), "debian.torrent");

        let bare = Url::parse("https://host/").unwrap();
        assert_eq!(uri_display_name(&bare), "https://host/");
    }

    #[test]
    fn in_flight_states() {
        assert!(is_in_flight(TransferState::Waiting));
        assert!(is_in_flight(TransferState::Uncompressing));
        assert!(!is_in_flight(TransferState::Complete));
        assert!(!is_in_flight(TransferState::Cancelled));
    }
}
