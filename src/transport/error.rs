//! Error types for the transport module.

use thiserror::Error;

/// Errors raised while connecting or exchanging a request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connect host could not be resolved to an address.
    #[error("unable to resolve '{host}': {source}")]
    Resolve {
        /// The host that failed to resolve.
        host: String,
        /// The underlying resolver error.
        #[source]
        source: std::io::Error,
    },

    /// No connection could be opened to the resolved address.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// `ip:port` that was tried.
        address: String,
        /// The underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// The request or connect attempt did not complete in time.
    #[error("timeout talking to {target}")]
    Timeout {
        /// URL or address involved.
        target: String,
    },

    /// The server does not speak the requested protocol version.
    #[error("server does not speak {requested}: {detail}")]
    VersionMismatch {
        /// The pinned protocol.
        requested: String,
        /// What was observed instead.
        detail: String,
    },

    /// Any other request-level failure.
    #[error("request to {url} failed: {source}")]
    Request {
        /// The URL requested.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be configured.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// `send` was called before a successful `connect`.
    #[error("transport is not connected")]
    NotConnected,
}

impl TransportError {
    /// Creates a timeout error.
    pub fn timeout(target: impl Into<String>) -> Self {
        Self::Timeout {
            target: target.into(),
        }
    }

    /// Creates a version mismatch error.
    pub fn version_mismatch(requested: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::VersionMismatch {
            requested: requested.into(),
            detail: detail.into(),
        }
    }
}
