//! Client configuration.

use std::time::Duration;

/// Settings for the underlying `reqwest` client.
///
/// Per-request timeouts come from each
/// [`FetchRequest`](transit_core::ports::FetchRequest); this only covers what
/// is shared by every request.
///
/// ```
/// use std::time::Duration;
/// use transit_http::HttpFetcherConfig;
///
/// let config = HttpFetcherConfig::new()
///     .with_user_agent("my-app/1.0")
///     .with_connect_timeout(Duration::from_secs(5));
/// assert_eq!(config.user_agent, "my-app/1.0");
/// ```
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// User agent sent with every request.
    pub user_agent: String,
    /// Limit on establishing a TCP/TLS connection.
    pub connect_timeout: Duration,
    /// Maximum redirects followed before giving up.
    pub max_redirects: usize,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("transit/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(10),
            max_redirects: 10,
        }
    }
}

impl HttpFetcherConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_user_agent_names_the_crate_version() {
        let config = HttpFetcherConfig::default();
        assert!(config.user_agent.starts_with("transit/"));
        assert_eq!(config.max_redirects, 10);
    }
}
