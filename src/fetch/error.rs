//! Error types for the fetch loop.
//!
//! Every variant carries the URL or path involved so the operator can tell
//! which segment ended the run.

use std::path::PathBuf;

use thiserror::Error;

use super::classify::Outcome;
use crate::transport::TransportError;

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed into a request.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL as given.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The transport failed to connect or exchange the request.
    #[error("transport error fetching {url}: {source}")]
    Transport {
        /// The URL (or connect target) involved.
        url: String,
        /// The underlying transport error.
        #[source]
        source: TransportError,
    },

    /// The response status was classified as fatal.
    #[error("request failed ({outcome} {status}) fetching {url}")]
    Status {
        /// The URL that was fetched.
        url: String,
        /// HTTP status code.
        status: u16,
        /// The fatal classification.
        outcome: Outcome,
    },

    /// The output file could not be written.
    #[error("{path} could not be opened for writing: {source}")]
    Io {
        /// The destination path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The URL path has no final component to name the output file after.
    #[error("cannot derive an output filename from {url}")]
    EmptyFileName {
        /// The URL involved.
        url: String,
    },

    /// Reading the interactive input stream failed.
    #[error("failed to read input: {0}")]
    Input(#[source] std::io::Error),

    /// Writing the report stream failed.
    #[error("failed to write report: {0}")]
    Output(#[source] std::io::Error),
}

impl FetchError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(url: impl Into<String>, source: TransportError) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Creates a fatal-status error.
    pub fn status(url: impl Into<String>, status: u16, outcome: Outcome) -> Self {
        Self::Status {
            url: url.into(),
            status,
            outcome,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the transport reported a protocol version mismatch.
    #[must_use]
    pub fn is_version_mismatch(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                source: TransportError::VersionMismatch { .. },
                ..
            }
        )
    }
}
