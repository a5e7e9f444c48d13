//! Immutable run configuration and its validation errors.
//!
//! A [`RunConfig`] is built once, before any network activity, and handed to
//! the [`FetchLoop`](crate::fetch::FetchLoop) by reference. Nothing in the
//! core reads process-wide flags.

use std::path::PathBuf;

use thiserror::Error;

use crate::fetch::{Headers, UrlTemplate, parse_header_spec};

/// Default number of segments fetched per benchmark repeat.
pub const DEFAULT_MAX_SEGMENTS: u32 = 150;

/// Default number of benchmark repeats.
pub const DEFAULT_MAX_REPEATS: u32 = 1;

/// Errors detected while assembling the run configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The benchmark URL pattern does not contain the segment placeholder.
    #[error("URL pattern '{pattern}' does not contain the placeholder '{placeholder}'")]
    MissingPlaceholder {
        /// The offending pattern.
        pattern: String,
        /// The placeholder that was expected.
        placeholder: &'static str,
    },

    /// A header piece lacks the `name: value` separator.
    #[error("malformed header '{piece}': expected 'name: value'")]
    MalformedHeader {
        /// The trimmed piece that failed to parse.
        piece: String,
    },

    /// Both a plain and a hex-encoded body were supplied.
    #[error("only one of --body and --body-hex may be set")]
    BodyConflict,

    /// The hex-encoded body could not be decoded.
    #[error("invalid --body-hex value: {reason}")]
    InvalidHexBody {
        /// Decoder message.
        reason: String,
    },

    /// Benchmark mode was requested without a URL pattern.
    #[error("--benchmark requires --benchmark-file-url")]
    MissingBenchmarkPattern,

    /// No URL was available to derive the connect target from.
    #[error("a target URL is required (positional argument or --benchmark-file-url)")]
    MissingTarget,

    /// The target URL could not be parsed.
    #[error("invalid target URL '{url}': {reason}")]
    InvalidTarget {
        /// The URL as given.
        url: String,
        /// Parser message.
        reason: String,
    },
}

/// How URLs are produced for a run.
#[derive(Debug, Clone)]
pub enum RunMode {
    /// Render `template` for every segment of every repeat.
    Benchmark {
        /// The original, never-mutated URL pattern.
        template: UrlTemplate,
        /// Segments per repeat.
        max_segments: u32,
        /// Number of repeats.
        max_repeats: u32,
    },
    /// Read URLs (or the exit command) from a line-oriented input stream.
    Interactive,
}

impl RunMode {
    /// Short label used in logs and the run summary.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Benchmark { .. } => "benchmark",
            Self::Interactive => "interactive",
        }
    }
}

/// Configuration captured before the fetch loop starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Folder the response bodies are written into.
    pub folder: PathBuf,
    /// Benchmark or interactive.
    pub mode: RunMode,
    /// Extra request headers, in declaration order.
    pub headers: Headers,
    /// Request body; a non-empty body turns requests into POSTs.
    pub body: Vec<u8>,
    /// Suppress per-request size markers and hex dumps.
    pub quiet: bool,
    /// Persist response bodies to `folder`.
    pub write_files: bool,
    /// Hex-dump request and response bodies (set when the body came in as hex).
    pub hex_dump: bool,
    /// Treat 3xx statuses as success.
    pub redirect_is_success: bool,
    /// End the run cleanly when the transport reports a protocol version mismatch.
    pub version_mismatch_ok: bool,
}

impl RunConfig {
    /// Creates an interactive configuration writing into `folder`.
    #[must_use]
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            mode: RunMode::Interactive,
            headers: Headers::default(),
            body: Vec::new(),
            quiet: false,
            write_files: true,
            hex_dump: false,
            redirect_is_success: false,
            version_mismatch_ok: false,
        }
    }

    /// Switches to benchmark mode over `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingPlaceholder`] if the pattern has no placeholder.
    pub fn benchmark(
        mut self,
        pattern: &str,
        max_segments: u32,
        max_repeats: u32,
    ) -> Result<Self, ConfigError> {
        self.mode = RunMode::Benchmark {
            template: UrlTemplate::new(pattern)?,
            max_segments,
            max_repeats,
        };
        Ok(self)
    }

    /// Parses and sets the semicolon-separated header list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedHeader`] for a piece without `:`.
    pub fn with_header_spec(mut self, spec: &str) -> Result<Self, ConfigError> {
        self.headers = parse_header_spec(spec)?;
        Ok(self)
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the redirect-success policy.
    #[must_use]
    pub fn with_redirect_is_success(mut self, redirect_is_success: bool) -> Self {
        self.redirect_is_success = redirect_is_success;
        self
    }

    /// Sets whether response bodies are written to disk.
    #[must_use]
    pub fn with_write_files(mut self, write_files: bool) -> Self {
        self.write_files = write_files;
        self
    }

    /// Sets the quiet flag.
    #[must_use]
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Sets the version-mismatch tolerance.
    #[must_use]
    pub fn with_version_mismatch_ok(mut self, version_mismatch_ok: bool) -> Self {
        self.version_mismatch_ok = version_mismatch_ok;
        self
    }
}

/// Resolves the request body from the plain and hex-encoded alternatives.
///
/// Returns the decoded bytes and whether they came from hex input.
///
/// # Errors
///
/// Returns [`ConfigError::BodyConflict`] when both are non-empty and
/// [`ConfigError::InvalidHexBody`] when the hex does not decode.
pub fn resolve_body(
    body: Option<&str>,
    body_hex: Option<&str>,
) -> Result<(Vec<u8>, bool), ConfigError> {
    let body = body.filter(|b| !b.is_empty());
    let body_hex = body_hex.map(str::trim).filter(|b| !b.is_empty());
    match (body, body_hex) {
        (Some(_), Some(_)) => Err(ConfigError::BodyConflict),
        (None, Some(encoded)) => hex::decode(encoded)
            .map(|bytes| (bytes, true))
            .map_err(|e| ConfigError::InvalidHexBody {
                reason: e.to_string(),
            }),
        (Some(plain), None) => Ok((plain.as_bytes().to_vec(), false)),
        (None, None) => Ok((Vec::new(), false)),
    }
}
