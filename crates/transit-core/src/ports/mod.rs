//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the transfer manager expects from its
//! collaborators. They contain no implementation details and use only domain
//! types.
//!
//! # Design Rules
//!
//! - No `reqwest` or engine-library types in any signature
//! - Synchronous methods must not block on network I/O
//! - Every port ships a no-op or in-memory implementation for tests and CLI use

pub mod connectivity;
pub mod event_emitter;
pub mod fetch;
pub mod library;
pub mod settings_store;
pub mod torrent_engine;

pub use connectivity::{ConnectivityPort, FixedConnectivity};
pub use event_emitter::{BroadcastTransferEmitter, NoopTransferEmitter, TransferEventEmitterPort};
pub use fetch::{FetchPort, FetchRequest, FetchSink};
pub use library::{LibraryIndexerPort, NoopLibraryIndexer};
pub use settings_store::{InMemorySettingsStore, SettingsStorePort};
pub use torrent_engine::{
    EngineEvent, NoopTorrentEngine, TorrentDownloadEvent, TorrentEnginePort, TorrentHandle,
};
