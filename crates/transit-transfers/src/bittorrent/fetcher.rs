//! Placeholder transfer while a torrent's metadata is fetched.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use transit_core::ports::FetchRequest;
use transit_core::transfer::{
    FileSelection, TransferError, TransferEvent, TransferId, TransferState,
};

use crate::context::TransferContext;
use crate::http::remove_quietly;
use crate::manager::registry::Collection;

const LOG_TARGET: &str = "transit.transfers";

struct Status {
    state: TransferState,
    error: Option<TransferError>,
}

/// Fetches a `.torrent` (over HTTP, or through the engine for magnets) and
/// hands it to the engine.
///
/// Once the engine accepts the torrent this placeholder unregisters itself;
/// the engine's `DownloadAdded` notification then registers the real
/// [`BittorrentDownload`](super::BittorrentDownload).
pub struct TorrentFetcherDownload {
    id: TransferId,
    uri: String,
    display_name: String,
    size: u64,
    selection: Option<FileSelection>,
    torrent_path: PathBuf,
    created: DateTime<Utc>,
    status: Mutex<Status>,
    cancel: CancellationToken,
    ctx: TransferContext,
}

impl TorrentFetcherDownload {
    pub(crate) fn new(
        ctx: TransferContext,
        uri: impl Into<String>,
        display_name: impl Into<String>,
        size: u64,
        selection: Option<FileSelection>,
    ) -> Arc<Self> {
        let uri = uri.into();
        let torrent_path = ctx.config.torrents_directory.join(torrent_file_name(&uri));
        Arc::new(Self {
            id: TransferId::from_url(&uri),
            display_name: display_name.into(),
            uri,
            size,
            selection,
            torrent_path,
            created: Utc::now(),
            status: Mutex::new(Status {
                state: TransferState::Waiting,
                error: None,
            }),
            cancel: CancellationToken::new(),
            ctx,
        })
    }

    /// Start fetching in the background.
    pub fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.ctx.runtime.spawn(async move { this.run().await });
    }

    async fn run(self: Arc<Self>) {
        if !self.set_state(TransferState::DownloadingMetadata) {
            return;
        }
        tracing::info!(target: LOG_TARGET, id = %self.id, "Fetching torrent metadata");

        let result = tokio::select! {
            () = self.cancel.cancelled() => Err(TransferError::Cancelled),
            r = self.fetch_and_hand_off() => r,
        };

        match result {
            Ok(()) => {
                tracing::info!(target: LOG_TARGET, id = %self.id, "Torrent handed to engine");
                self.ctx
                    .unregister(Collection::Bittorrent, &self.id, self.addr());
            }
            Err(err) if err.is_cancelled() || self.cancel.is_cancelled() => {
                tracing::debug!(target: LOG_TARGET, id = %self.id, "Torrent fetch cancelled");
                remove_quietly(&self.torrent_path);
            }
            Err(err) => {
                tracing::warn!(target: LOG_TARGET, id = %self.id, error = %err, "Torrent fetch failed");
                remove_quietly(&self.torrent_path);
                if self.set_state(TransferState::Error) {
                    self.lock().error = Some(err);
                }
            }
        }
    }

    async fn fetch_and_hand_off(&self) -> Result<(), TransferError> {
        let selection = self.selection.as_deref();

        if is_magnet(&self.uri) {
            let bytes = self
                .ctx
                .engine
                .fetch_magnet(&self.uri, self.ctx.config.magnet_timeout)
                .await?;
            return self.ctx.engine.download_torrent_bytes(&bytes, selection);
        }

        if let Some(parent) = self.torrent_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::from_io_error(&e))?;
        }
        let request = FetchRequest::new(
            self.uri.clone(),
            self.torrent_path.clone(),
            self.ctx.config.fetch_timeout,
        )
        .with_cancel(self.cancel.clone());
        let mut sink = |_len: usize| {
            if self.cancel.is_cancelled() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        self.ctx.fetcher.save(&request, &mut sink).await?;

        self.ctx
            .engine
            .download_torrent_file(&self.torrent_path, selection)
    }

    /// Cancel the fetch and unregister.
    pub fn remove(&self) {
        let cancelled = {
            let mut status = self.lock();
            if status.state.is_terminal() {
                false
            } else {
                status.state = TransferState::Cancelled;
                true
            }
        };
        self.cancel.cancel();
        if cancelled {
            self.ctx.emitter.emit(TransferEvent::StateChanged {
                id: self.id.clone(),
                state: TransferState::Cancelled,
            });
        }
        self.ctx
            .unregister(Collection::Bittorrent, &self.id, self.addr());
    }

    fn set_state(&self, next: TransferState) -> bool {
        {
            let mut status = self.lock();
            if status.state.is_terminal() {
                return false;
            }
            status.state = next;
        }
        self.ctx.emitter.emit(TransferEvent::StateChanged {
            id: self.id.clone(),
            state: next,
        });
        true
    }

    fn lock(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn addr(&self) -> *const () {
        std::ptr::from_ref(self).cast()
    }

    /// Identity (the source URI).
    pub const fn id(&self) -> &TransferId {
        &self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Size reported by the search source, 0 when unknown.
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Where an HTTP-fetched `.torrent` is saved.
    pub fn torrent_path(&self) -> &Path {
        &self.torrent_path
    }

    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn state(&self) -> TransferState {
        self.lock().state
    }

    pub fn last_error(&self) -> Option<TransferError> {
        self.lock().error.clone()
    }

    /// A failed fetch counts as done, like a failed HTTP download.
    pub fn is_complete(&self) -> bool {
        self.state() == TransferState::Error
    }

    pub fn is_downloading(&self) -> bool {
        self.state().is_downloading()
    }
}

impl std::fmt::Debug for TorrentFetcherDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorrentFetcherDownload")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn is_magnet(uri: &str) -> bool {
    uri.get(..7)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("magnet:"))
}

/// A file name for the fetched `.torrent`, from the URL's last path segment.
fn torrent_file_name(uri: &str) -> String {
    let last = url::Url::parse(uri).ok().and_then(|u| {
        u.path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .filter(|s| !s.is_empty())
    });
    match last {
        Some(name) if name.to_ascii_lowercase().ends_with(".torrent") => name,
        Some(name) => format!("{name}.torrent"),
        None => format!("{}.torrent", uuid::Uuid::new_v4()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnet_detection_ignores_case() {
        assert!(is_magnet("magnet:?xt=urn:btih:abc"));
        assert!(is_magnet("MAGNET:?xt=urn:btih:abc"));
        assert!(!is_magnet("http://host/a.torrent"));
        assert!(!is_magnet("mag"));
    }

    #[test]
    fn torrent_file_names() {
        assert_eq!(
            torrent_file_name("http://host/files/ubuntu.torrent"),
            "ubuntu.torrent"
        );
        assert_eq!(torrent_file_name("https://host/get/42"), "42.torrent");
        assert!(torrent_file_name("https://host/").ends_with(".torrent"));
    }
}
