//! Segfetch Core Library
//!
//! Fetches a templated series of media segments (benchmark mode) or a stream
//! of URLs read from input (interactive mode), writes every response body to
//! disk, and reports sizes, status outcomes, and run timing.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Immutable run configuration and validation errors
//! - [`fetch`] - URL templating, request building, classification, file sink, the fetch loop
//! - [`report`] - Line-oriented stdout report
//! - [`transport`] - The `Transport` capability and its reqwest-backed implementation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod fetch;
pub mod report;
pub mod transport;
mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, RunConfig, RunMode};
pub use fetch::{FetchError, FetchLoop, Outcome, RunEnd, RunState, RunSummary};
pub use transport::{HttpTransport, Protocol, Transport, TransportError, TransportOptions};
