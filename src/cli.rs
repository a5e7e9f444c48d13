//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use url::Url;

use segfetch_core::config::{DEFAULT_MAX_REPEATS, DEFAULT_MAX_SEGMENTS, resolve_body};
use segfetch_core::transport::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use segfetch_core::{ConfigError, Protocol, RunConfig, TransportOptions};

/// Fetch templated media segments or interactive URL streams and record them to disk.
///
/// In benchmark mode every segment of the `--benchmark-file-url` pattern is
/// fetched `--max-repeat-count` times. Otherwise URLs are read from stdin,
/// one token at a time, until `exit`.
#[derive(Parser, Debug)]
#[command(name = "segfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Target URL; the server to connect to
    pub url: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress size markers, hex dumps and non-error logs
    #[arg(short, long)]
    pub quiet: bool,

    /// IP address or hostname to connect to instead of the URL host
    #[arg(long)]
    pub host: Option<String>,

    /// Port to connect to instead of the URL port
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Folder the fetched files are written into
    #[arg(short = 'f', long, default_value = ".")]
    pub folder: PathBuf,

    /// Request body; a non-empty body turns requests into POSTs
    #[arg(long, conflicts_with = "body_hex")]
    pub body: Option<String>,

    /// Hex-encoded request body; request and response bodies are hex-dumped
    #[arg(long)]
    pub body_hex: Option<String>,

    /// Semicolon separated list of name:value request headers
    #[arg(long, default_value = "")]
    pub headers: String,

    /// HTTP protocol version to speak
    #[arg(long, value_enum, default_value_t = ProtocolArg::Auto)]
    pub protocol: ProtocolArg,

    /// Do not treat a protocol version mismatch as a failure
    #[arg(long)]
    pub version_mismatch_ok: bool,

    /// Treat 3xx responses as success instead of failure
    #[arg(long)]
    pub redirect_is_success: bool,

    /// Initial HTTP/2 stream window size in bytes
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub initial_window: Option<u32>,

    /// Do not verify TLS certificates
    #[arg(long)]
    pub disable_certificate_verification: bool,

    /// Run the segment benchmark instead of reading URLs from stdin
    #[arg(long)]
    pub benchmark: bool,

    /// Segment URL pattern; `segment` is replaced by the segment number
    #[arg(long)]
    pub benchmark_file_url: Option<String>,

    /// Segments fetched per benchmark repeat
    #[arg(long, default_value_t = DEFAULT_MAX_SEGMENTS, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_segment: u32,

    /// Number of benchmark repeats
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_REPEATS, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_repeat_count: u32,

    /// Fetch and measure without writing response bodies to disk
    #[arg(long)]
    pub no_write: bool,

    /// Connect timeout in seconds (1-3600)
    #[arg(long, default_value_t = CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: u64,

    /// Whole-request timeout in seconds (1-86400)
    #[arg(long, default_value_t = READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=86400))]
    pub timeout: u64,

    /// Write a JSON run summary to this file
    #[arg(long)]
    pub summary_json: Option<PathBuf>,
}

/// `--protocol` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProtocolArg {
    /// Negotiate
    Auto,
    /// HTTP/1.1 only
    Http1,
    /// HTTP/2 with prior knowledge
    Http2,
}

impl From<ProtocolArg> for Protocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Auto => Self::Auto,
            ProtocolArg::Http1 => Self::Http1,
            ProtocolArg::Http2 => Self::Http2,
        }
    }
}

/// Everything `main` needs to start a run.
#[derive(Debug)]
pub struct LaunchPlan {
    /// Core loop configuration.
    pub run: RunConfig,
    /// Transport configuration.
    pub transport: TransportOptions,
    /// URL whose server the transport connects to.
    pub target: Url,
}

impl Args {
    /// Validates the flags and converts them into a [`LaunchPlan`].
    pub fn launch_plan(&self) -> Result<LaunchPlan, ConfigError> {
        let (body, from_hex) = resolve_body(self.body.as_deref(), self.body_hex.as_deref())?;

        let mut run = RunConfig::new(&self.folder)
            .with_header_spec(&self.headers)?
            .with_body(body)
            .with_quiet(self.quiet)
            .with_write_files(!self.no_write)
            .with_redirect_is_success(self.redirect_is_success)
            .with_version_mismatch_ok(self.version_mismatch_ok);
        run.hex_dump = from_hex;

        if self.benchmark {
            let pattern = self
                .benchmark_file_url
                .as_deref()
                .ok_or(ConfigError::MissingBenchmarkPattern)?;
            run = run.benchmark(pattern, self.max_segment, self.max_repeat_count)?;
        }

        let target = self
            .url
            .as_deref()
            .or(self.benchmark_file_url.as_deref().filter(|_| self.benchmark))
            .ok_or(ConfigError::MissingTarget)?;
        let target = Url::parse(target).map_err(|e| ConfigError::InvalidTarget {
            url: target.to_string(),
            reason: e.to_string(),
        })?;

        let transport = TransportOptions {
            protocol: self.protocol.into(),
            host_override: self.host.clone(),
            port: self.port,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            read_timeout: Duration::from_secs(self.timeout),
            initial_window: self.initial_window,
            accept_invalid_certs: self.disable_certificate_verification,
        };

        Ok(LaunchPlan {
            run,
            transport,
            target,
        })
    }
}
