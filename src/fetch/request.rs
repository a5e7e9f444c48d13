//! Request construction: method selection, header list parsing, descriptors.

use std::fmt;

use reqwest::header::{HeaderName, HeaderValue};
use tracing::trace;
use url::Url;

use super::error::FetchError;
use crate::config::ConfigError;

/// Request method. Only GET and POST are ever issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Empty request body.
    Get,
    /// Non-empty request body.
    Post,
}

impl Method {
    /// POST when `body` is non-empty, GET otherwise.
    #[must_use]
    pub fn for_body(body: &[u8]) -> Self {
        if body.is_empty() { Self::Get } else { Self::Post }
    }

    /// Upper-case method token.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered header list where a repeated name overwrites the earlier value in place.
///
/// Names compare ASCII case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Inserts or overwrites `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Looks up a header value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Iterates in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of distinct headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no headers are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses a `name: value; name: value` header list.
///
/// Empty pieces are skipped; name and value are trimmed independently and
/// split on the first `:` only, so values may contain colons.
///
/// # Errors
///
/// Returns [`ConfigError::MalformedHeader`] for a non-empty piece without `:`,
/// or whose name or value is not a valid HTTP header token.
///
/// # Examples
///
/// ```
/// use segfetch_core::fetch::parse_header_spec;
///
/// let headers = parse_header_spec("A: 1; B: 2").unwrap();
/// assert_eq!(headers.get("A"), Some("1"));
/// assert_eq!(headers.get("B"), Some("2"));
/// ```
pub fn parse_header_spec(spec: &str) -> Result<Headers, ConfigError> {
    let mut headers = Headers::default();
    for piece in spec.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, value) = piece
            .split_once(':')
            .map(|(n, v)| (n.trim(), v.trim()))
            .filter(|(n, v)| {
                HeaderName::from_bytes(n.as_bytes()).is_ok() && HeaderValue::from_str(v).is_ok()
            })
            .ok_or_else(|| ConfigError::MalformedHeader {
                piece: piece.to_string(),
            })?;
        trace!(name, value, "parsed header");
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Everything a transport needs to issue one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// GET or POST.
    pub method: Method,
    /// The parsed request URL.
    pub url: Url,
    /// URL scheme, e.g. `https`.
    pub scheme: String,
    /// Host, with the port when one was given explicitly.
    pub authority: String,
    /// Path plus query string.
    pub path: String,
    /// Extra headers in declaration order.
    pub headers: Headers,
    /// Request body, possibly empty.
    pub body: Vec<u8>,
}

/// Builds [`RequestDescriptor`]s from URLs using a fixed body and header list.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    body: Vec<u8>,
    headers: Headers,
}

impl RequestBuilder {
    /// Creates a builder from an already parsed header list.
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>, headers: Headers) -> Self {
        Self {
            body: body.into(),
            headers,
        }
    }

    /// Creates a builder from a raw header list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedHeader`] if the list does not parse.
    pub fn from_spec(body: impl Into<Vec<u8>>, header_spec: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(body, parse_header_spec(header_spec)?))
    }

    /// The method every request from this builder will use.
    #[must_use]
    pub fn method(&self) -> Method {
        Method::for_body(&self.body)
    }

    /// Builds the descriptor for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] if `url` does not parse or has no host.
    pub fn build(&self, url: &str) -> Result<RequestDescriptor, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::invalid_url(url, e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| FetchError::invalid_url(url, "URL has no host"))?;
        let authority = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let path = match parsed.query() {
            Some(query) => format!("{}?{query}", parsed.path()),
            None => parsed.path().to_string(),
        };

        Ok(RequestDescriptor {
            method: self.method(),
            scheme: parsed.scheme().to_string(),
            authority,
            path,
            headers: self.headers.clone(),
            body: self.body.clone(),
            url: parsed,
        })
    }
}
