//! Scripted fakes of every port, for tests.
//!
//! Enabled in this crate's own tests and, through the `test-utils` feature,
//! in downstream crates' tests.

use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;

use transit_core::ports::{
    EngineEvent, FetchPort, FetchRequest, FetchSink, FixedConnectivity, InMemorySettingsStore,
    LibraryIndexerPort, TorrentDownloadEvent, TorrentEnginePort, TorrentHandle,
    TransferEventEmitterPort,
};
use transit_core::settings::EngineSetting;
use transit_core::transfer::types::percent;
use transit_core::transfer::{
    Eta, FetchError, TorrentCrawledSearchResult, TransferError, TransferEvent, TransferId,
    TransferItem, TransferState,
};

use crate::config::TransferManagerConfig;
use crate::manager::{TransferManager, TransferManagerDeps};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write a zip archive holding `entries` (name, contents) at `path`.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, contents) in entries {
        zip.start_file(*name, options)
            .map_err(std::io::Error::other)?;
        zip.write_all(contents.as_bytes())?;
    }
    zip.finish().map_err(std::io::Error::other)?;
    Ok(())
}

// =============================================================================
// Fetcher
// =============================================================================

/// What one scripted fetch attempt does.
#[derive(Debug, Clone)]
pub enum FetchScript {
    /// Write each chunk, then succeed.
    Chunks(Vec<Vec<u8>>),
    /// Write `partial`, then fail with the error.
    Fail(Vec<u8>, FetchError),
    /// Write each chunk, then hang until the request is cancelled.
    Stall(Vec<Vec<u8>>),
    /// Write each chunk followed by a pause, then succeed.
    Paced(Vec<Vec<u8>>, Duration),
}

/// A [`FetchPort`] that plays back scripted attempts.
///
/// Attempts are consumed in order; once the queue is empty every further
/// attempt repeats the fallback (an empty successful download by default).
#[derive(Debug)]
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<FetchScript>>,
    fallback: Mutex<FetchScript>,
    urls: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(FetchScript::Chunks(Vec::new())),
            urls: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue one attempt.
    pub fn push(&self, step: FetchScript) {
        lock(&self.script).push_back(step);
    }

    /// Play `step` for every attempt once the queue runs dry.
    pub fn repeat(&self, step: FetchScript) {
        *lock(&self.fallback) = step;
    }

    /// Number of `save` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs requested, in order.
    pub fn urls(&self) -> Vec<String> {
        lock(&self.urls).clone()
    }

    fn next_step(&self) -> FetchScript {
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| lock(&self.fallback).clone())
    }
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn write_chunks(
    request: &FetchRequest,
    chunks: &[Vec<u8>],
    sink: &mut dyn FetchSink,
) -> Result<(), FetchError> {
    let mut file = File::create(&request.destination).map_err(|e| FetchError::io(e.to_string()))?;
    for chunk in chunks {
        if request.cancel.is_cancelled() {
            return Err(FetchError::cancelled());
        }
        file.write_all(chunk)
            .map_err(|e| FetchError::io(e.to_string()))?;
        if sink.on_data(chunk.len()) == ControlFlow::Break(()) {
            return Err(FetchError::cancelled());
        }
    }
    Ok(())
}

fn append_chunk(
    request: &FetchRequest,
    chunk: &[u8],
    sink: &mut dyn FetchSink,
) -> Result<(), FetchError> {
    if request.cancel.is_cancelled() {
        return Err(FetchError::cancelled());
    }
    let mut file = OpenOptions::new()
        .append(true)
        .open(&request.destination)
        .map_err(|e| FetchError::io(e.to_string()))?;
    file.write_all(chunk)
        .map_err(|e| FetchError::io(e.to_string()))?;
    if sink.on_data(chunk.len()) == ControlFlow::Break(()) {
        return Err(FetchError::cancelled());
    }
    Ok(())
}

#[async_trait]
impl FetchPort for ScriptedFetcher {
    async fn save(&self, request: &FetchRequest, sink: &mut dyn FetchSink) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.urls).push(request.url.clone());

        match self.next_step() {
            FetchScript::Chunks(chunks) => write_chunks(request, &chunks, sink),
            FetchScript::Fail(partial, err) => {
                write_chunks(request, &[partial], sink)?;
                Err(err)
            }
            FetchScript::Stall(chunks) => {
                write_chunks(request, &chunks, sink)?;
                request.cancel.cancelled().await;
                Err(FetchError::cancelled())
            }
            FetchScript::Paced(chunks, pause) => {
                write_chunks(request, &[], sink)?;
                for chunk in &chunks {
                    append_chunk(request, chunk, sink)?;
                    tokio::time::sleep(pause).await;
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// Torrent engine
// =============================================================================

#[derive(Debug)]
struct HandleState {
    display_name: String,
    state: TransferState,
    size: u64,
    items: Vec<TransferItem>,
    partial: bool,
    bytes_received: u64,
    download_speed: u64,
    upload_speed: u64,
    paused: bool,
    seeding: bool,
    complete: bool,
    remove_error: Option<TransferError>,
    removed: Option<(bool, bool)>,
}

/// A [`TorrentHandle`] whose state tests set directly.
#[derive(Debug)]
pub struct FakeTorrentHandle {
    info_hash: String,
    save_path: PathBuf,
    created: DateTime<Utc>,
    state: Mutex<HandleState>,
    listener: Mutex<Option<UnboundedSender<TorrentDownloadEvent>>>,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
}

impl FakeTorrentHandle {
    /// A downloading, unpaused torrent of `size` bytes.
    pub fn new(info_hash: &str, display_name: &str, save_path: impl Into<PathBuf>, size: u64) -> Arc<Self> {
        Arc::new(Self {
            info_hash: info_hash.to_string(),
            save_path: save_path.into(),
            created: Utc::now(),
            state: Mutex::new(HandleState {
                display_name: display_name.to_string(),
                state: TransferState::Downloading,
                size,
                items: Vec::new(),
                partial: false,
                bytes_received: 0,
                download_speed: 0,
                upload_speed: 0,
                paused: false,
                seeding: false,
                complete: false,
                remove_error: None,
                removed: None,
            }),
            listener: Mutex::new(None),
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
        })
    }

    pub fn set_display_name(&self, name: &str) {
        lock(&self.state).display_name = name.to_string();
    }

    pub fn set_state(&self, state: TransferState) {
        lock(&self.state).state = state;
    }

    /// Replace the file list; `partial` marks some files as deselected.
    pub fn set_items(&self, items: Vec<TransferItem>, partial: bool) {
        let mut state = lock(&self.state);
        state.items = items;
        state.partial = partial;
    }

    pub fn set_progress(&self, bytes_received: u64, download_speed: u64) {
        let mut state = lock(&self.state);
        state.bytes_received = bytes_received;
        state.download_speed = download_speed;
    }

    pub fn set_upload_speed(&self, speed: u64) {
        lock(&self.state).upload_speed = speed;
    }

    /// Mark the download finished; `seeding` keeps it uploading.
    pub fn set_complete(&self, seeding: bool) {
        let mut state = lock(&self.state);
        state.complete = true;
        state.seeding = seeding;
        state.bytes_received = state.size;
        state.state = if seeding {
            TransferState::Seeding
        } else {
            TransferState::Finished
        };
    }

    /// Make the next `remove` fail with `err`.
    pub fn fail_remove(&self, err: TransferError) {
        lock(&self.state).remove_error = Some(err);
    }

    /// Push a notification to the adapter; false when nobody listens.
    pub fn notify(&self, event: TorrentDownloadEvent) -> bool {
        lock(&self.listener)
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    /// Flags of the last successful `remove`.
    pub fn removed(&self) -> Option<(bool, bool)> {
        lock(&self.state).removed
    }
}

impl TorrentHandle for FakeTorrentHandle {
    fn info_hash(&self) -> String {
        self.info_hash.clone()
    }

    fn display_name(&self) -> String {
        lock(&self.state).display_name.clone()
    }

    fn save_path(&self) -> PathBuf {
        self.save_path.clone()
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn size(&self) -> u64 {
        lock(&self.state).size
    }

    fn items(&self) -> Vec<TransferItem> {
        lock(&self.state).items.clone()
    }

    fn is_partial(&self) -> bool {
        lock(&self.state).partial
    }

    fn state(&self) -> TransferState {
        let state = lock(&self.state);
        if state.paused {
            TransferState::Paused
        } else {
            state.state
        }
    }

    fn bytes_received(&self) -> u64 {
        lock(&self.state).bytes_received
    }

    fn bytes_sent(&self) -> u64 {
        0
    }

    fn download_speed(&self) -> u64 {
        lock(&self.state).download_speed
    }

    fn upload_speed(&self) -> u64 {
        lock(&self.state).upload_speed
    }

    fn eta(&self) -> Eta {
        let state = lock(&self.state);
        Eta::from_progress(state.size, state.bytes_received, state.download_speed)
    }

    fn progress(&self) -> u8 {
        let state = lock(&self.state);
        if state.complete {
            100
        } else {
            percent(state.bytes_received, state.size)
        }
    }

    fn connected_peers(&self) -> u32 {
        0
    }

    fn total_peers(&self) -> u32 {
        0
    }

    fn connected_seeds(&self) -> u32 {
        0
    }

    fn total_seeds(&self) -> u32 {
        0
    }

    fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }

    fn is_seeding(&self) -> bool {
        let state = lock(&self.state);
        state.seeding && !state.paused
    }

    fn is_finished(&self) -> bool {
        lock(&self.state).complete
    }

    fn is_complete(&self) -> bool {
        lock(&self.state).complete
    }

    fn is_downloading(&self) -> bool {
        let state = lock(&self.state);
        !state.paused && !state.complete && state.state == TransferState::Downloading
    }

    fn is_uploading(&self) -> bool {
        self.is_seeding()
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        lock(&self.state).paused = true;
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        lock(&self.state).paused = false;
    }

    fn remove(&self, delete_torrent: bool, delete_data: bool) -> Result<(), TransferError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.remove_error.clone() {
            return Err(err);
        }
        state.removed = Some((delete_torrent, delete_data));
        Ok(())
    }

    fn set_listener(&self, tx: UnboundedSender<TorrentDownloadEvent>) {
        *lock(&self.listener) = Some(tx);
    }
}

/// What a [`FakeTorrentEngine`] was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    TorrentFile(PathBuf, Option<Vec<bool>>),
    TorrentBytes(Vec<u8>, Option<Vec<bool>>),
    Existing(String, Option<Vec<bool>>),
    Crawled(String),
    FetchMagnet(String),
    Restore,
    Setting(EngineSetting, i64),
}

/// A [`TorrentEnginePort`] that records calls and announces scripted handles.
#[derive(Debug, Default)]
pub struct FakeTorrentEngine {
    calls: Mutex<Vec<EngineCall>>,
    known: Mutex<HashMap<String, Arc<FakeTorrentHandle>>>,
    restorable: Mutex<Vec<Arc<FakeTorrentHandle>>>,
    listener: Mutex<Option<UnboundedSender<EngineEvent>>>,
    magnet: Mutex<Option<Vec<u8>>>,
    refuse: AtomicBool,
    download_rate: AtomicU64,
    upload_rate: AtomicU64,
}

impl FakeTorrentEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.calls).clone()
    }

    /// Let `find_torrent` resolve `handle`.
    pub fn add_known(&self, handle: Arc<FakeTorrentHandle>) {
        lock(&self.known).insert(handle.info_hash.to_ascii_lowercase(), handle);
    }

    /// Announce `handle` on the next `restore_downloads`.
    pub fn add_restorable(&self, handle: Arc<FakeTorrentHandle>) {
        lock(&self.restorable).push(handle);
    }

    /// Announce `handle` as added; false when no listener is installed.
    pub fn announce(&self, handle: Arc<FakeTorrentHandle>) -> bool {
        lock(&self.listener)
            .as_ref()
            .is_some_and(|tx| tx.send(EngineEvent::DownloadAdded(handle)).is_ok())
    }

    /// Resolve magnets to these bytes (magnets fail otherwise).
    pub fn set_magnet_bytes(&self, bytes: Vec<u8>) {
        *lock(&self.magnet) = Some(bytes);
    }

    /// Make every download request fail.
    pub fn refuse_downloads(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn set_rates(&self, download: u64, upload: u64) {
        self.download_rate.store(download, Ordering::SeqCst);
        self.upload_rate.store(upload, Ordering::SeqCst);
    }

    fn record(&self, call: EngineCall) -> Result<(), TransferError> {
        lock(&self.calls).push(call);
        if self.refuse.load(Ordering::SeqCst) {
            Err(TransferError::engine("refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TorrentEnginePort for FakeTorrentEngine {
    fn download_torrent_file(&self, path: &Path, selection: Option<&[bool]>) -> Result<(), TransferError> {
        self.record(EngineCall::TorrentFile(path.to_path_buf(), selection.map(<[bool]>::to_vec)))
    }

    fn download_torrent_bytes(&self, bytes: &[u8], selection: Option<&[bool]>) -> Result<(), TransferError> {
        self.record(EngineCall::TorrentBytes(bytes.to_vec(), selection.map(<[bool]>::to_vec)))
    }

    fn download_existing(&self, info_hash: &str, selection: Option<&[bool]>) -> Result<(), TransferError> {
        self.record(EngineCall::Existing(info_hash.to_string(), selection.map(<[bool]>::to_vec)))
    }

    fn download_crawled(&self, result: &TorrentCrawledSearchResult) -> Result<(), TransferError> {
        self.record(EngineCall::Crawled(result.file_path.clone()))
    }

    async fn fetch_magnet(&self, uri: &str, _timeout: Duration) -> Result<Vec<u8>, TransferError> {
        lock(&self.calls).push(EngineCall::FetchMagnet(uri.to_string()));
        lock(&self.magnet)
            .clone()
            .ok_or_else(|| TransferError::engine("magnet timed out"))
    }

    fn restore_downloads(&self) {
        lock(&self.calls).push(EngineCall::Restore);
        let handles = lock(&self.restorable).clone();
        for handle in handles {
            self.announce(handle);
        }
    }

    fn find_torrent(&self, info_hash: &str) -> Option<Arc<dyn TorrentHandle>> {
        lock(&self.known)
            .get(&info_hash.to_ascii_lowercase())
            .map(|handle| Arc::clone(handle) as Arc<dyn TorrentHandle>)
    }

    fn set_listener(&self, tx: UnboundedSender<EngineEvent>) {
        *lock(&self.listener) = Some(tx);
    }

    fn download_rate(&self) -> u64 {
        self.download_rate.load(Ordering::SeqCst)
    }

    fn upload_rate(&self) -> u64 {
        self.upload_rate.load(Ordering::SeqCst)
    }

    fn set_setting(&self, setting: EngineSetting, value: i64) {
        lock(&self.calls).push(EngineCall::Setting(setting, value));
    }

    fn is_started(&self) -> bool {
        true
    }

    fn is_firewalled(&self) -> bool {
        false
    }
}

// =============================================================================
// Indexer and emitter
// =============================================================================

/// Remembers every scanned path.
#[derive(Debug, Default)]
pub struct RecordingIndexer {
    scanned: Mutex<Vec<PathBuf>>,
}

impl RecordingIndexer {
    pub fn scanned(&self) -> Vec<PathBuf> {
        lock(&self.scanned).clone()
    }
}

impl LibraryIndexerPort for RecordingIndexer {
    fn scan(&self, path: &Path) {
        lock(&self.scanned).push(path.to_path_buf());
    }
}

/// Remembers every emitted event; clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingEmitter {
    events: Arc<Mutex<Vec<TransferEvent>>>,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<TransferEvent> {
        lock(&self.events).clone()
    }

    /// States `id` went through, in order.
    pub fn states_of(&self, id: &TransferId) -> Vec<TransferState> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                TransferEvent::StateChanged { id: event_id, state } if event_id == id => {
                    Some(*state)
                }
                _ => None,
            })
            .collect()
    }
}

impl TransferEventEmitterPort for RecordingEmitter {
    fn emit(&self, event: TransferEvent) {
        lock(&self.events).push(event);
    }

    fn clone_box(&self) -> Box<dyn TransferEventEmitterPort> {
        Box::new(self.clone())
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A manager wired to fakes, saving under a caller-provided directory.
pub struct Harness {
    pub fetcher: Arc<ScriptedFetcher>,
    pub engine: Arc<FakeTorrentEngine>,
    pub indexer: Arc<RecordingIndexer>,
    pub connectivity: Arc<FixedConnectivity>,
    pub settings: Arc<InMemorySettingsStore>,
    pub emitter: RecordingEmitter,
    pub manager: Arc<TransferManager>,
}

impl Harness {
    /// Must be called from within a Tokio runtime.
    pub fn new(save_directory: &Path) -> Self {
        Self::with_config(TransferManagerConfig::new(save_directory.to_path_buf()))
    }

    pub fn with_config(config: TransferManagerConfig) -> Self {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let engine = Arc::new(FakeTorrentEngine::new());
        let indexer = Arc::new(RecordingIndexer::default());
        let connectivity = Arc::new(FixedConnectivity::wifi());
        let settings = Arc::new(InMemorySettingsStore::new());
        let emitter = RecordingEmitter::default();

        let manager = Arc::new(TransferManager::new(TransferManagerDeps {
            fetcher: Arc::clone(&fetcher) as Arc<dyn FetchPort>,
            engine: Arc::clone(&engine) as Arc<dyn TorrentEnginePort>,
            indexer: Arc::clone(&indexer) as Arc<dyn LibraryIndexerPort>,
            connectivity: Arc::clone(&connectivity) as _,
            settings: Arc::clone(&settings) as _,
            emitter: Arc::new(emitter.clone()),
            config,
        }));

        Self {
            fetcher,
            engine,
            indexer,
            connectivity,
            settings,
            emitter,
            manager,
        }
    }
}

/// Poll `condition` every 10 ms until it holds, giving up after `timeout`.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
