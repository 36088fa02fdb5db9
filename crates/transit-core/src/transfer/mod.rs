//! Transfer domain types, events, errors and search results.
//!
//! This module contains pure data types for the transfer system. No I/O,
//! networking, or runtime dependencies allowed.
//!
//! # Structure
//!
//! - `state` - The shared `TransferState` machine
//! - `types` - Identifiers, kinds, links and items
//! - `peer` - Peers and the files they share
//! - `search` - Search-result variants the manager can start transfers from
//! - `summary` - Point-in-time views (`TransferSummary`, `Eta`)
//! - `events` - Events emitted through the event-emitter port
//! - `errors` - Error taxonomy for transfer and fetch operations

pub mod errors;
pub mod events;
pub mod peer;
pub mod search;
pub mod state;
pub mod summary;
pub mod types;

pub use errors::{FetchError, FetchErrorKind, TransferError};
pub use events::TransferEvent;
pub use peer::{FileDescriptor, Peer};
pub use search::{
    HttpSearchResult, HttpSlideSearchResult, SearchResult, StreamingMediaSearchResult,
    TorrentCrawledSearchResult, TorrentSearchResult,
};
pub use state::TransferState;
pub use summary::{Eta, TransferSummary};
pub use types::{FileSelection, HttpDownloadLink, TransferId, TransferItem, TransferKind, TransferResult};
