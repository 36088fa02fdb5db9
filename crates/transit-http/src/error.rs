//! Errors raised while setting up the HTTP client.
//!
//! Fetch failures themselves are reported as
//! [`FetchError`](transit_core::transfer::FetchError).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The TLS backend or client builder rejected the configuration.
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}
