//! `FetchPort` over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use tokio::io::AsyncWriteExt;

use transit_core::ports::{FetchPort, FetchRequest, FetchSink};
use transit_core::transfer::FetchError;

use crate::config::HttpFetcherConfig;
use crate::error::HttpClientError;

const LOG_TARGET: &str = "transit.http";

/// Streams HTTP(S) responses to disk.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(config: &HttpFetcherConfig) -> Result<Self, HttpClientError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .redirect(Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, request: &FetchRequest, sink: &mut dyn FetchSink) -> Result<u64, FetchError> {
        let response = within(request.timeout, self.client.get(&request.url).send())
            .await?
            .map_err(from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(
                status.as_u16(),
                header_pairs(response.headers()),
            ));
        }

        if let Some(parent) = request.destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(from_io)?;
        }
        let mut file = tokio::fs::File::create(&request.destination)
            .await
            .map_err(from_io)?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = within(request.timeout, stream.next()).await? {
            let chunk = chunk.map_err(from_reqwest)?;
            file.write_all(&chunk).await.map_err(from_io)?;
            written += chunk.len() as u64;
            if sink.on_data(chunk.len()).is_break() {
                return Err(FetchError::cancelled());
            }
        }
        file.flush().await.map_err(from_io)?;
        Ok(written)
    }
}

#[async_trait]
impl FetchPort for ReqwestFetcher {
    async fn save(&self, request: &FetchRequest, sink: &mut dyn FetchSink) -> Result<(), FetchError> {
        tracing::debug!(target: LOG_TARGET, url = %request.url, dest = %request.destination.display(), "Fetch started");

        let result = tokio::select! {
            () = request.cancel.cancelled() => Err(FetchError::cancelled()),
            r = self.fetch(request, sink) => r,
        };

        match &result {
            Ok(bytes) => {
                tracing::debug!(target: LOG_TARGET, url = %request.url, bytes, "Fetch finished");
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!(target: LOG_TARGET, url = %request.url, "Fetch cancelled");
            }
            Err(e) => {
                tracing::debug!(target: LOG_TARGET, url = %request.url, status = ?e.status, error = %e, "Fetch failed");
            }
        }
        result.map(|_| ())
    }
}

/// Await `fut`, failing with a timeout if it takes longer than `limit`.
async fn within<F: std::future::Future>(limit: Duration, fut: F) -> Result<F::Output, FetchError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| FetchError::timeout(format!("no response within {}s", limit.as_secs_f32())))
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn from_reqwest(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::timeout(err.to_string())
    } else {
        FetchError::network(err.to_string())
    }
}

fn from_io(err: std::io::Error) -> FetchError {
    FetchError::io(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, RETRY_AFTER};

    #[test]
    fn header_pairs_skip_non_ascii_values() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        headers.insert("x-bin", HeaderValue::from_bytes(b"\xff").unwrap());

        let pairs = header_pairs(&headers);
        assert_eq!(pairs, vec![("retry-after".to_string(), "30".to_string())]);
    }

    #[tokio::test]
    async fn within_reports_timeouts() {
        let err = within(Duration::from_millis(10), std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(err.kind, transit_core::transfer::FetchErrorKind::Timeout);
    }
}
