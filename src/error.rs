//! Error types for catalog operations.
//!
//! This module provides the [`OpcError`] type for all connector operations,
//! the [`TransportError`] type describing a single failed HTTP exchange, and
//! the [`Result`] convenience type.

use thiserror::Error;

/// Error type for all catalog connector operations.
///
/// The variants separate failures a caller can act on differently: a broken
/// configuration, a catalog that answered with something unusable (or could
/// not be reached at all), and a catalog that affirmatively has no data.
#[derive(Error, Debug)]
pub enum OpcError {
    /// Missing or invalid endpoint configuration. Not retryable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or unexpected response, or a transport failure on a
    /// first (or only) request of an operation.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The catalog reported that it has no data for a valid request.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl OpcError {
    /// Wrap a transport failure of `operation` into a [`OpcError::Protocol`].
    pub(crate) fn transport(operation: &str, subject: &str, err: &TransportError) -> Self {
        OpcError::Protocol(format!("{operation} \"{subject}\" failed: {err}"))
    }
}

/// A failed HTTP exchange with the catalog.
///
/// Every variant carries the requested URL so that diagnostics always name
/// the endpoint that misbehaved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The server answered with a non-success status code.
    #[error("HTTP status {status} from {url}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Connecting, resolving, reading or waiting for the response failed.
    #[error("request to {url} failed: {message}")]
    Io {
        /// Requested URL
        url: String,
        /// Underlying transport error text
        message: String,
    },
}

impl TransportError {
    /// The URL of the failed request.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            TransportError::Status { url, .. } | TransportError::Io { url, .. } => url,
        }
    }

    /// Returns `true` if the server answered `404 Not Found`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::Status { status: 404, .. })
    }
}

/// Convenience type alias for [`std::result::Result`] with [`OpcError`].
pub type Result<T> = std::result::Result<T, OpcError>;
