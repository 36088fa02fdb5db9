//! Transfer error types.
//!
//! These errors are designed to be serializable and not depend on external
//! error types like `std::io::Error`. For I/O errors, we capture the kind
//! and message as strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// HTTP status the server uses to ask us to come back later.
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// Error type for transfer operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransferError {
    /// I/O error during file operations.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g., "NotFound", "PermissionDenied").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// Network/HTTP error during a fetch.
    #[error("Network error: {message}")]
    Network {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// Extracting a compressed download failed.
    #[error("Decompression failed: {message}")]
    Decompression {
        /// Detailed error message.
        message: String,
    },

    /// The BitTorrent engine rejected an operation.
    #[error("Engine error: {message}")]
    Engine {
        /// Detailed error message.
        message: String,
    },

    /// A download URI could not be parsed.
    #[error("Invalid URI '{uri}': {message}")]
    InvalidUri {
        /// The offending URI.
        uri: String,
        /// Why parsing failed.
        message: String,
    },

    /// A download URI used a scheme we cannot fetch from.
    #[error("Unsupported URI scheme: {scheme}")]
    UnsupportedScheme {
        /// The scheme that was rejected.
        scheme: String,
    },

    /// The transfer was cancelled by the user.
    #[error("Transfer cancelled")]
    Cancelled,

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl TransferError {
    /// Create an I/O error from a `std::io::Error`.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Io {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a decompression error.
    pub fn decompression(message: impl Into<String>) -> Self {
        Self::Decompression {
            message: message.into(),
        }
    }

    /// Create an engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Create an invalid-URI error.
    pub fn invalid_uri(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported-scheme error.
    pub fn unsupported_scheme(scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            scheme: scheme.into(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (can retry).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Io { .. })
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Io { message, .. } => format!("File operation failed: {message}"),
            Self::Network {
                message,
                status_code: Some(code),
            } => format!("Network error (HTTP {code}): {message}"),
            Self::Network { message, .. } => format!("Network error: {message}"),
            Self::Decompression { .. } => {
                "The download finished but could not be extracted.".to_string()
            }
            Self::Engine { message } => format!("BitTorrent engine error: {message}"),
            Self::InvalidUri { uri, .. } => format!("'{uri}' is not a valid download link."),
            Self::UnsupportedScheme { scheme } => {
                format!("Downloads from '{scheme}:' links are not supported.")
            }
            Self::Cancelled => "Transfer was cancelled.".to_string(),
            Self::Other { message } => message.clone(),
        }
    }
}

impl From<FetchError> for TransferError {
    fn from(err: FetchError) -> Self {
        match err.kind {
            FetchErrorKind::Cancelled => Self::Cancelled,
            FetchErrorKind::Io => Self::Io {
                kind: "Other".to_string(),
                message: err.message,
            },
            FetchErrorKind::Status | FetchErrorKind::Timeout | FetchErrorKind::Network => {
                Self::Network {
                    message: err.message,
                    status_code: err.status,
                }
            }
        }
    }
}

/// Broad category of a failed fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Cancelled through the request's token or by the data sink.
    Cancelled,
    /// No response (or no data) within the request timeout.
    Timeout,
    /// The server answered with a non-success status.
    Status,
    /// Connection-level failure.
    Network,
    /// Writing the destination file failed.
    Io,
}

/// Failure reported by the fetch primitive.
///
/// Carries the HTTP status and response headers so callers can decide on
/// server-directed retries.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    /// Failure category.
    pub kind: FetchErrorKind,
    /// Detailed error message.
    pub message: String,
    /// HTTP status code, when the server answered.
    pub status: Option<u16>,
    /// Response headers, keyed by lower-case name.
    pub headers: BTreeMap<String, String>,
}

impl FetchError {
    /// A fetch aborted through cancellation.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(FetchErrorKind::Cancelled, "transfer cancelled")
    }

    /// A fetch that timed out.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, message)
    }

    /// A connection-level failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Network, message)
    }

    /// A local write failure.
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Io, message)
    }

    /// A non-success HTTP status.
    pub fn status<I, K, V>(status: u16, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            kind: FetchErrorKind::Status,
            message: format!("HTTP {status}"),
            status: Some(status),
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
                .collect(),
        }
    }

    fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            headers: BTreeMap::new(),
        }
    }

    /// Look up a response header (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the server answered 503 Service Unavailable.
    #[must_use]
    pub fn is_service_unavailable(&self) -> bool {
        self.status == Some(SERVICE_UNAVAILABLE)
    }

    /// The `Retry-After` delay in seconds, if the header is present and numeric.
    ///
    /// Returns `Some(0)` for an explicit zero; callers treat that as
    /// non-retryable.
    #[must_use]
    pub fn retry_after(&self) -> Option<u64> {
        self.header("Retry-After")?.trim().parse().ok()
    }

    /// Whether this failure came from cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind == FetchErrorKind::Cancelled
    }
}
