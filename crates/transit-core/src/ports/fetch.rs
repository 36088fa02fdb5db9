//! Fetch port: the raw "stream this URL to that file" primitive.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::transfer::FetchError;

/// One fetch attempt.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Source URL.
    pub url: String,
    /// File to write the body to (created or truncated).
    pub destination: PathBuf,
    /// Give up when no response or no data arrives within this window.
    pub timeout: Duration,
    /// Cooperative cancellation; the fetch returns `Cancelled` once fired.
    pub cancel: CancellationToken,
}

impl FetchRequest {
    /// Build a request with a fresh cancellation token.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Use the given cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Receives progress for each chunk written to disk.
///
/// Returning `ControlFlow::Break` aborts the fetch, which then reports
/// [`FetchErrorKind::Cancelled`](crate::transfer::FetchErrorKind::Cancelled).
pub trait FetchSink: Send {
    /// Called after `len` more bytes have been written.
    fn on_data(&mut self, len: usize) -> ControlFlow<()>;
}

impl<F> FetchSink for F
where
    F: FnMut(usize) -> ControlFlow<()> + Send,
{
    fn on_data(&mut self, len: usize) -> ControlFlow<()> {
        self(len)
    }
}

/// Streams a remote resource to a local file.
///
/// One call per attempt: retry policy belongs to the caller, which is why
/// failures carry the HTTP status and response headers.
#[async_trait]
pub trait FetchPort: Send + Sync {
    /// Save `request.url` to `request.destination`, reporting chunks to `sink`.
    async fn save(&self, request: &FetchRequest, sink: &mut dyn FetchSink) -> Result<(), FetchError>;
}
