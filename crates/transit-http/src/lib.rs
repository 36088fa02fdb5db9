//! HTTP fetch adapter for transit.
//!
//! Implements [`FetchPort`](transit_core::ports::FetchPort) on top of
//! `reqwest`: one call streams one URL into one file, honouring the
//! request's cancellation token and per-chunk timeout. Retry policy lives in
//! the transfer manager, so non-success responses are reported with their
//! status and headers instead of being retried here.

mod config;
mod error;
mod fetcher;

pub use config::HttpFetcherConfig;
pub use error::HttpClientError;
pub use fetcher::ReqwestFetcher;
