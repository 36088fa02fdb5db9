//! Core domain types and port definitions for transit.
//!
//! This crate holds the vocabulary shared by every other crate in the
//! workspace: transfer identities and states, search results, summaries,
//! events and errors, plus the port traits through which the transfer
//! manager talks to its collaborators (HTTP fetcher, BitTorrent engine,
//! library indexer, connectivity oracle, settings store, event sink).
//!
//! No networking or file-system work happens here.

pub mod ports;
pub mod settings;
pub mod transfer;

// Re-export commonly used types for convenience
pub use ports::{
    BroadcastTransferEmitter, ConnectivityPort, EngineEvent, FetchPort, FetchRequest, FetchSink,
    FixedConnectivity, InMemorySettingsStore, LibraryIndexerPort, NoopLibraryIndexer,
    NoopTorrentEngine, NoopTransferEmitter, SettingsStorePort, TorrentDownloadEvent,
    TorrentEnginePort, TorrentHandle, TransferEventEmitterPort,
};
pub use settings::{EngineSetting, SettingKey, SettingValue};
pub use transfer::{
    Eta, FetchError, FetchErrorKind, FileDescriptor, FileSelection, HttpDownloadLink, HttpSearchResult,
    HttpSlideSearchResult, Peer, SearchResult, StreamingMediaSearchResult, TorrentCrawledSearchResult,
    TorrentSearchResult, TransferError, TransferEvent, TransferId, TransferItem, TransferKind,
    TransferResult, TransferState, TransferSummary,
};
