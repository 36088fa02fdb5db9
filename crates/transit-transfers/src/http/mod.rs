//! HTTP download engine.
//!
//! An [`HttpDownload`] drives one resource through
//! `Waiting → Downloading → [Uncompressing →] Complete`, on its own task:
//!
//! - bytes are streamed to disk through the [`FetchPort`](transit_core::ports::FetchPort)
//! - a 503 carrying `Retry-After` puts it back to `Waiting` for that many
//!   seconds, up to the configured retry bound
//! - any other failure lands in `Error` and the partial file is deleted
//! - `remove` cancels cooperatively: the fetch observes the token and the
//!   chunk sink refuses further data once the state is `Cancelled`

mod speed;
mod unzip;

pub use speed::SpeedMeter;

use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use transit_core::ports::FetchRequest;
use transit_core::transfer::types::percent;
use transit_core::transfer::{
    Eta, FetchError, FileDescriptor, HttpDownloadLink, Peer, TransferError, TransferEvent,
    TransferId, TransferKind, TransferState,
};

use crate::context::TransferContext;
use crate::manager::registry::Collection;

const LOG_TARGET: &str = "transit.transfers";

/// Mutable part of a download, written only by its own task and `remove`.
struct Status {
    state: TransferState,
    bytes_received: u64,
    speed: SpeedMeter,
    error: Option<TransferError>,
}

/// A single HTTP (or peer) download.
pub struct HttpDownload {
    id: TransferId,
    kind: TransferKind,
    link: HttpDownloadLink,
    save_path: PathBuf,
    created: DateTime<Utc>,
    status: Mutex<Status>,
    cancel: CancellationToken,
    ctx: TransferContext,
}

impl HttpDownload {
    /// Create a download of `link` keyed by `id` (the details URL).
    pub(crate) fn new(ctx: TransferContext, id: TransferId, link: HttpDownloadLink) -> Arc<Self> {
        Arc::new(Self::build(ctx, id, TransferKind::Http, link))
    }

    /// Create a download pulling `fd` from `peer`'s HTTP server.
    pub(crate) fn peer(ctx: TransferContext, peer: &Peer, fd: &FileDescriptor) -> Arc<Self> {
        let link = HttpDownloadLink::new(fd.download_url(peer), fd.file_name(), fd.file_size)
            .with_display_name(&fd.title);
        let id = TransferId::from_url(&link.url);
        Arc::new(Self::build(ctx, id, TransferKind::PeerDownload, link))
    }

    fn build(
        ctx: TransferContext,
        id: TransferId,
        kind: TransferKind,
        link: HttpDownloadLink,
    ) -> Self {
        // Only the last component: a link must not write outside the save directory
        let file_name = Path::new(&link.file_name)
            .file_name()
            .map_or_else(|| "download".into(), |n| n.to_string_lossy().into_owned());
        let save_path = ctx.config.save_directory.join(file_name);
        let speed = SpeedMeter::new(ctx.config.speed_window);

        Self {
            id,
            kind,
            link,
            save_path,
            created: Utc::now(),
            status: Mutex::new(Status {
                state: TransferState::Waiting,
                bytes_received: 0,
                speed,
                error: None,
            }),
            cancel: CancellationToken::new(),
            ctx,
        }
    }

    /// Start downloading in the background. Never blocks.
    pub fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.ctx.runtime.spawn(async move { this.run().await });
    }

    async fn run(self: Arc<Self>) {
        let max_retries = self.ctx.config.max_http_retries;
        let mut retry = 0u32;
        let mut delay = Duration::ZERO;

        loop {
            if !delay.is_zero() {
                tokio::select! {
                    () = self.cancel.cancelled() => {
                        tracing::debug!(target: LOG_TARGET, id = %self.id, "Cancelled while waiting to retry");
                        return;
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }

            if !self.transition(TransferState::Downloading) {
                return;
            }
            tracing::info!(
                target: LOG_TARGET,
                id = %self.id,
                url = %self.link.url,
                attempt = retry + 1,
                "Starting HTTP download"
            );

            match self.fetch().await {
                Ok(()) => {
                    self.finish().await;
                    return;
                }
                Err(err) if err.is_cancelled() || self.cancel.is_cancelled() => {
                    tracing::debug!(target: LOG_TARGET, id = %self.id, "HTTP download cancelled");
                    self.discard_partial();
                    return;
                }
                Err(err) => match server_retry_delay(&err) {
                    Some(wait) if retry < max_retries => {
                        retry += 1;
                        tracing::warn!(
                            target: LOG_TARGET,
                            id = %self.id,
                            retry,
                            max_retries,
                            delay_secs = wait.as_secs(),
                            "Server busy, retrying"
                        );
                        self.discard_partial();
                        if !self.enter_retry_wait() {
                            return;
                        }
                        delay = wait;
                    }
                    _ => {
                        self.fail(TransferError::from(err));
                        return;
                    }
                },
            }
        }
    }

    async fn fetch(&self) -> Result<(), FetchError> {
        if let Some(parent) = self.save_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(format!("Failed to create {}: {e}", parent.display())))?;
        }

        let request = FetchRequest::new(
            self.link.url.clone(),
            self.save_path.clone(),
            self.ctx.config.fetch_timeout,
        )
        .with_cancel(self.cancel.clone());

        let mut sink = |len: usize| self.on_data(len);
        self.ctx.fetcher.save(&request, &mut sink).await
    }

    fn on_data(&self, len: usize) -> ControlFlow<()> {
        let mut status = self.lock();
        if status.state == TransferState::Cancelled {
            return ControlFlow::Break(());
        }
        status.bytes_received += len as u64;
        let total = status.bytes_received;
        status.speed.record(total);
        ControlFlow::Continue(())
    }

    async fn finish(&self) {
        if !self.link.compressed {
            self.complete(self.save_path.clone());
            return;
        }

        if !self.transition(TransferState::Uncompressing) {
            return;
        }
        let archive = self.save_path.clone();
        let dest = unzip::extraction_dir(&archive);
        let target = dest.clone();
        let result = tokio::task::spawn_blocking(move || unzip::unzip(&archive, &target))
            .await
            .unwrap_or_else(|e| {
                Err(TransferError::decompression(format!(
                    "Extraction task failed: {e}"
                )))
            });
        match result {
            Ok(files) => {
                tracing::debug!(target: LOG_TARGET, id = %self.id, files, dest = %dest.display(), "Extracted archive");
                self.complete(dest);
            }
            Err(err) => {
                self.fail(err);
                remove_dir_quietly(&dest);
            }
        }
    }

    /// `Complete` with the usable data at `final_path`, plus the completion
    /// side-effects. Extracted data of a download removed meanwhile is discarded.
    fn complete(&self, final_path: PathBuf) {
        if !self.transition(TransferState::Complete) {
            if self.link.compressed {
                tracing::debug!(target: LOG_TARGET, id = %self.id, "Removed while extracting");
                remove_dir_quietly(&final_path);
            }
            return;
        }
        {
            let mut status = self.lock();
            let total = status.bytes_received;
            status.speed.reset(total);
        }

        tracing::info!(
            target: LOG_TARGET,
            id = %self.id,
            path = %final_path.display(),
            "HTTP download complete"
        );

        self.ctx.emitter.emit(TransferEvent::Completed {
            id: self.id.clone(),
            path: final_path.clone(),
        });
        self.ctx.increment_downloads_to_review();
        self.ctx
            .notify_download_finished(&self.link.display_name, &final_path);
    }

    fn fail(&self, err: TransferError) {
        if self.transition(TransferState::Error) {
            self.lock().error = Some(err.clone());
            tracing::warn!(target: LOG_TARGET, id = %self.id, error = %err, "HTTP download failed");
            self.discard_partial();
        }
    }

    /// Validated state change; emits `StateChanged` when the state moved.
    fn transition(&self, next: TransferState) -> bool {
        let mut status = self.lock();
        if status.state == next {
            return true;
        }
        if !status.state.can_transition_to(next) {
            tracing::debug!(
                target: LOG_TARGET,
                id = %self.id,
                from = %status.state,
                to = %next,
                "State change rejected"
            );
            return false;
        }
        status.state = next;
        drop(status);

        self.ctx.emitter.emit(TransferEvent::StateChanged {
            id: self.id.clone(),
            state: next,
        });
        true
    }

    /// `Downloading → Waiting` for a retry; the next attempt starts from zero bytes.
    fn enter_retry_wait(&self) -> bool {
        let mut status = self.lock();
        if !status.state.can_transition_to(TransferState::Waiting) {
            return false;
        }
        status.state = TransferState::Waiting;
        status.bytes_received = 0;
        status.speed.reset(0);
        drop(status);

        self.ctx.emitter.emit(TransferEvent::StateChanged {
            id: self.id.clone(),
            state: TransferState::Waiting,
        });
        true
    }

    fn discard_partial(&self) {
        remove_quietly(&self.save_path);
    }

    /// Stop and unregister the download.
    ///
    /// Unfinished downloads become `Cancelled` and their partial file is
    /// deleted; finished data is deleted only when `delete_data` is set.
    pub fn remove(&self, delete_data: bool) {
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
            tracing::info!(target: LOG_TARGET, id = %self.id, "HTTP download cancelled");
            self.ctx.emitter.emit(TransferEvent::StateChanged {
                id: self.id.clone(),
                state: TransferState::Cancelled,
            });
            self.discard_partial();
        } else if delete_data && self.state() == TransferState::Complete {
            remove_quietly(&self.save_path);
            if self.link.compressed {
                remove_dir_quietly(&unzip::extraction_dir(&self.save_path));
            }
        }

        self.ctx.unregister(Collection::Downloads, &self.id, self.addr());
    }

    fn lock(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn addr(&self) -> *const () {
        std::ptr::from_ref(self).cast()
    }

    /// Identity (details URL).
    pub const fn id(&self) -> &TransferId {
        &self.id
    }

    /// `Http` or `PeerDownload`.
    pub const fn kind(&self) -> TransferKind {
        self.kind
    }

    /// The resource being downloaded.
    pub const fn link(&self) -> &HttpDownloadLink {
        &self.link
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &str {
        &self.link.display_name
    }

    /// Where the payload is written.
    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    /// Where the usable data ends up (the extraction directory for archives).
    pub fn final_path(&self) -> PathBuf {
        if self.link.compressed {
            unzip::extraction_dir(&self.save_path)
        } else {
            self.save_path.clone()
        }
    }

    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn state(&self) -> TransferState {
        self.lock().state
    }

    /// Expected size in bytes (0 when unknown).
    pub const fn size(&self) -> u64 {
        self.link.size
    }

    pub fn bytes_received(&self) -> u64 {
        self.lock().bytes_received
    }

    /// Windowed average in bytes/s; 0 unless downloading.
    pub fn download_speed(&self) -> u64 {
        let status = self.lock();
        if status.state == TransferState::Downloading {
            status.speed.bytes_per_sec()
        } else {
            0
        }
    }

    /// 0 while the size is unknown; otherwise 100 once complete and the
    /// received share of the size, capped below 100, before that.
    pub fn progress(&self) -> u8 {
        if self.link.size == 0 {
            return 0;
        }
        let status = self.lock();
        if status.state == TransferState::Complete {
            100
        } else {
            percent(status.bytes_received, self.link.size).min(99)
        }
    }

    pub fn eta(&self) -> Eta {
        Eta::from_progress(self.size(), self.bytes_received(), self.download_speed())
    }

    /// Complete with every expected byte, or failed.
    pub fn is_complete(&self) -> bool {
        let status = self.lock();
        match status.state {
            TransferState::Error => true,
            TransferState::Complete => {
                self.link.size == 0 || status.bytes_received >= self.link.size
            }
            _ => false,
        }
    }

    pub fn is_downloading(&self) -> bool {
        self.state() == TransferState::Downloading
    }

    /// Why the download failed, once it has.
    pub fn last_error(&self) -> Option<TransferError> {
        self.lock().error.clone()
    }
}

impl std::fmt::Debug for HttpDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDownload")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// The server-requested wait before retrying, for 503 + a positive `Retry-After`.
fn server_retry_delay(err: &FetchError) -> Option<Duration> {
    if !err.is_service_unavailable() {
        return None;
    }
    match err.retry_after() {
        Some(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => None,
    }
}

/// Delete `path`, logging (not returning) any failure other than absence.
pub(crate) fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete file");
        }
    }
}

fn remove_dir_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete extracted data");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transit_core::transfer::{HttpSlideSearchResult, SearchResult};

    use crate::Transfer;
    use crate::testing::{FetchScript, Harness, wait_until, write_zip};

    #[test]
    fn retry_delay_requires_503_and_positive_header() {
        let busy = FetchError::status(503, [("Retry-After", "2")]);
        assert_eq!(server_retry_delay(&busy), Some(Duration::from_secs(2)));

        let zero = FetchError::status(503, [("Retry-After", "0")]);
        assert_eq!(server_retry_delay(&zero), None);

        let missing: FetchError = FetchError::status(503, Vec::<(String, String)>::new());
        assert_eq!(server_retry_delay(&missing), None);

        let not_found = FetchError::status(404, [("Retry-After", "2")]);
        assert_eq!(server_retry_delay(&not_found), None);
    }

    #[test]
    fn quiet_removal_tolerates_missing_and_undeletable_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.torrent");
        std::fs::write(&file, b"d4:infoe").unwrap();

        remove_quietly(&file);
        assert!(!file.exists());
        remove_quietly(&file);

        let busy = dir.path().join("b.torrent");
        std::fs::create_dir(&busy).unwrap();
        remove_quietly(&busy);
        assert!(busy.exists());
    }

    #[tokio::test]
    async fn removal_during_extraction_discards_the_extracted_data() {
        let dir = tempfile::tempdir().unwrap();
        let harness = Harness::new(dir.path());
        harness.fetcher.push(FetchScript::Stall(vec![b"PK".to_vec()]));

        let hit = SearchResult::HttpSlide(HttpSlideSearchResult {
            details_url: "http://site/slides/deck".to_string(),
            link: HttpDownloadLink::new("http://cdn/deck.zip", "deck.zip", 0).with_compressed(true),
        });
        harness.manager.download(&hit);
        let id = TransferId::from_url("http://site/slides/deck");
        let Some(Transfer::Http(download)) = harness.manager.get(&id) else {
            panic!("expected an HTTP download");
        };
        assert!(wait_until(Duration::from_secs(5), || download.bytes_received() > 0).await);

        // Extraction has written its output when the download is removed
        write_zip(download.save_path(), &[("slide1.txt", "one")]).unwrap();
        let dest = unzip::extraction_dir(download.save_path());
        unzip::unzip(download.save_path(), &dest).unwrap();
        assert!(dest.join("slide1.txt").exists());

        download.remove(false);
        download.complete(dest.clone());

        assert_eq!(download.state(), TransferState::Cancelled);
        assert!(!dest.exists());
        assert!(!download.save_path().exists());
        assert!(
            !harness
                .emitter
                .events()
                .iter()
                .any(|e| matches!(e, TransferEvent::Completed { .. }))
        );
    }
}
