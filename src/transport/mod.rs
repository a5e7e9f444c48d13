//! The network exchange capability consumed by the fetch loop.
//!
//! The loop only ever sees the [`Transport`] trait: it connects once, then
//! sends one request at a time and waits for the [`ResponseResult`]. Which
//! protocol engine sits behind the trait is decided once at startup.
//!
//! - [`HttpTransport`] - reqwest-backed HTTP/1.1 or HTTP/2 transport

mod constants;
mod error;
mod http;

use async_trait::async_trait;
use url::Url;

use crate::fetch::RequestDescriptor;

pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::TransportError;
pub use http::{HttpTransport, Protocol, TransportOptions};

/// Status and body of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseResult {
    /// HTTP status code.
    pub status: u16,
    /// Full response body.
    pub body: Vec<u8>,
}

impl ResponseResult {
    /// Creates a response result.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// A protocol engine able to perform request/response exchanges.
///
/// This trait uses `async_trait` so the fetch loop can hold a
/// `&mut dyn Transport` chosen at runtime.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short protocol name for logs.
    fn name(&self) -> &str;

    /// Establishes (or verifies) connectivity to the server behind `target`.
    async fn connect(&mut self, target: &Url) -> Result<(), TransportError>;

    /// Sends one request and waits for the complete response.
    async fn send(&self, request: &RequestDescriptor) -> Result<ResponseResult, TransportError>;
}
