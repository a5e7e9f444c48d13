//! reqwest-backed HTTP transport.
//!
//! `connect` resolves the connect host, checks that a TCP connection can be
//! opened, then builds a client pinned to that address. Redirects are never
//! followed so 3xx statuses reach the classifier, and proxies are bypassed so
//! measurements reflect the direct path to the server.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Version};
use tokio::net::{TcpStream, lookup_host};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::{ResponseResult, Transport, TransportError};
use crate::fetch::{Method, RequestDescriptor};
use crate::user_agent;

/// HTTP protocol version to speak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    /// Let the client negotiate.
    #[default]
    Auto,
    /// HTTP/1.1 only.
    Http1,
    /// HTTP/2 with prior knowledge (no upgrade, no ALPN fallback).
    Http2,
}

impl Protocol {
    /// Human-readable protocol name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Http1 => "HTTP/1.1",
            Self::Http2 => "HTTP/2",
        }
    }

    /// True when a specific version was requested.
    #[must_use]
    pub fn is_pinned(self) -> bool {
        !matches!(self, Self::Auto)
    }

    fn accepts(self, version: Version) -> bool {
        match self {
            Self::Auto => true,
            Self::Http1 => version == Version::HTTP_11 || version == Version::HTTP_10,
            Self::Http2 => version == Version::HTTP_2,
        }
    }
}

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Protocol version to speak.
    pub protocol: Protocol,
    /// Host or IP to connect to instead of the URL host.
    pub host_override: Option<String>,
    /// Port to connect to instead of the URL port.
    pub port: Option<u16>,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub read_timeout: Duration,
    /// HTTP/2 initial stream window size in bytes.
    pub initial_window: Option<u32>,
    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            protocol: Protocol::Auto,
            host_override: None,
            port: None,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            initial_window: None,
            accept_invalid_certs: false,
        }
    }
}

/// HTTP transport built on a reqwest [`Client`].
///
/// The client is created by [`connect`](Transport::connect) and reused for
/// every request afterwards.
#[derive(Debug, Default)]
pub struct HttpTransport {
    options: TransportOptions,
    client: Option<Client>,
    address: Option<SocketAddr>,
}

impl HttpTransport {
    /// Creates an unconnected transport.
    #[must_use]
    pub fn new(options: TransportOptions) -> Self {
        Self {
            options,
            client: None,
            address: None,
        }
    }

    /// The address resolved by the last successful connect.
    #[must_use]
    pub fn address(&self) -> Option<SocketAddr> {
        self.address
    }

    fn map_send_error(&self, url: &str, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            return TransportError::timeout(url);
        }
        if self.options.protocol == Protocol::Http2 && is_h2_framing_failure(&error) {
            return TransportError::version_mismatch(self.options.protocol.label(), error.to_string());
        }
        TransportError::Request {
            url: url.to_string(),
            source: error,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self), fields(target = %target))]
    async fn connect(&mut self, target: &Url) -> Result<(), TransportError> {
        let url_host = target
            .host_str()
            .ok_or_else(|| invalid_target(target, "URL has no host"))?;
        let port = self
            .options
            .port
            .or_else(|| target.port_or_known_default())
            .ok_or_else(|| invalid_target(target, "URL has no known default port"))?;
        let connect_host = self.options.host_override.as_deref().unwrap_or(url_host);

        let address = resolve_address(connect_host, port).await?;
        debug!(host = connect_host, %address, "resolved connect address");
        probe(address, self.options.connect_timeout).await?;

        let client = build_client(&self.options, url_host, address).map_err(TransportError::Client)?;
        info!(%address, protocol = self.options.protocol.label(), "connected");
        self.client = Some(client);
        self.address = Some(address);
        Ok(())
    }

    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: &RequestDescriptor) -> Result<ResponseResult, TransportError> {
        let client = self.client.as_ref().ok_or(TransportError::NotConnected)?;

        let mut url = request.url.clone();
        if let Some(port) = self.options.port {
            // Ports in the URL take precedence over the pinned address, so rewrite it.
            if url.set_port(Some(port)).is_err() {
                warn!(url = %url, "cannot apply port override to URL");
            }
        }

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = client.request(method, url.clone());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_send_error(url.as_str(), e))?;

        let version = response.version();
        if !self.options.protocol.accepts(version) {
            return Err(TransportError::version_mismatch(
                self.options.protocol.label(),
                format!("server answered {version:?}"),
            ));
        }

        let status = response.status().as_u16();
        let body = read_body(response, url.as_str()).await?;
        debug!(status, bytes = body.len(), "response received");
        Ok(ResponseResult { status, body })
    }
}

/// True when the h2 layer tore the connection down because the peer's bytes
/// are not HTTP/2 frames, as when an HTTP/1-only server answers the preface.
fn is_h2_framing_failure(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        if let Some(h2_error) = cause.downcast_ref::<h2::Error>() {
            return h2_error.is_go_away()
                && h2_error.is_library()
                && h2_error.reason().is_some_and(|reason| {
                    reason == h2::Reason::PROTOCOL_ERROR || reason == h2::Reason::FRAME_SIZE_ERROR
                });
        }
        source = cause.source();
    }
    false
}

fn invalid_target(target: &Url, reason: &str) -> TransportError {
    TransportError::Resolve {
        host: target.to_string(),
        source: io::Error::new(io::ErrorKind::InvalidInput, reason.to_string()),
    }
}

async fn resolve_address(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let resolve_error = |source| TransportError::Resolve {
        host: host.to_string(),
        source,
    };
    lookup_host((host, port))
        .await
        .map_err(resolve_error)?
        .next()
        .ok_or_else(|| {
            resolve_error(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses returned",
            ))
        })
}

async fn probe(address: SocketAddr, timeout: Duration) -> Result<(), TransportError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
        .await
        .map_err(|_| TransportError::timeout(address.to_string()))?
        .map_err(|source| TransportError::Connect {
            address: address.to_string(),
            source,
        })?;
    drop(stream);
    Ok(())
}

fn build_client(
    options: &TransportOptions,
    url_host: &str,
    address: SocketAddr,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .connect_timeout(options.connect_timeout)
        .timeout(options.read_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .user_agent(user_agent::default_user_agent())
        .resolve(url_host, address);

    builder = match options.protocol {
        Protocol::Auto => builder,
        Protocol::Http1 => builder.http1_only(),
        Protocol::Http2 => builder.http2_prior_knowledge(),
    };
    if let Some(window) = options.initial_window {
        builder = builder.http2_initial_stream_window_size(window);
    }
    if options.accept_invalid_certs {
        warn!("TLS certificate verification disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build()
}

/// Collects the response body, returning the bytes received.
async fn read_body(response: reqwest::Response, url: &str) -> Result<Vec<u8>, TransportError> {
    let capacity = response
        .content_length()
        .and_then(|len| usize::try_from(len).ok())
        .unwrap_or(0);
    let mut body = Vec::with_capacity(capacity);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            if e.is_timeout() {
                TransportError::timeout(url)
            } else {
                TransportError::Request {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
