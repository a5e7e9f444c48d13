//! The fetch-and-record loop.
//!
//! A [`FetchLoop`] moves through `Idle → Running → {Completed, Aborted}`.
//! Benchmark and interactive runs differ only in where URLs come from; each
//! URL goes through the same build → send → classify → write → record path.
//!
//! # Example
//!
//! ```no_run
//! use segfetch_core::config::RunConfig;
//! use segfetch_core::fetch::FetchLoop;
//! use segfetch_core::transport::{HttpTransport, TransportOptions};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunConfig::new("./segments").benchmark("http://cdn.example/segment.ts", 10, 1)?;
//! let mut transport = HttpTransport::new(TransportOptions::default());
//! let mut fetch_loop = FetchLoop::new(&config, &mut transport, tokio::io::empty(), std::io::stdout());
//! let summary = fetch_loop.run(&Url::parse("http://cdn.example/")?).await?;
//! println!("{} bytes", summary.total_bytes);
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::io::Write;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::classify::Outcome;
use super::error::FetchError;
use super::metrics::RunMetrics;
use super::request::RequestBuilder;
use super::sink::FileSink;
use super::template::UrlTemplate;
use crate::config::{RunConfig, RunMode};
use crate::report::{Reporter, format_time};
use crate::transport::Transport;

/// Interactive token that ends the run.
pub const EXIT_COMMAND: &str = "exit";

/// Lifecycle of a [`FetchLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Constructed, not yet run.
    Idle,
    /// Connecting or fetching.
    Running,
    /// Ended normally.
    Completed,
    /// Ended on a fatal error.
    Aborted,
}

/// Why a completed run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEnd {
    /// Every benchmark segment of every repeat was fetched.
    Finished,
    /// The interactive exit command was read.
    ExitCommand,
    /// The interactive input stream closed.
    EndOfInput,
    /// The server spoke another protocol version and that was tolerated.
    VersionMismatchTolerated,
}

/// Serializable record of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// `benchmark` or `interactive`.
    pub mode: &'static str,
    /// Why the run ended.
    pub end: RunEnd,
    /// Requests that completed successfully.
    pub requests: u64,
    /// Response bytes downloaded.
    pub total_bytes: u64,
    /// HTTP date the run started.
    pub started_at: String,
    /// HTTP date the run finished.
    pub finished_at: String,
    /// Wall-clock duration in seconds.
    pub elapsed_secs: f64,
    /// Average bytes per second.
    pub throughput_bytes_per_sec: f64,
}

/// Drives one run over a [`Transport`].
///
/// `R` is the interactive input (ignored in benchmark mode) and `W` receives
/// the stdout report.
pub struct FetchLoop<'a, R, W> {
    config: &'a RunConfig,
    transport: &'a mut dyn Transport,
    requests: RequestBuilder,
    sink: FileSink,
    metrics: RunMetrics,
    reporter: Reporter<W>,
    input: Lines<R>,
    pending: VecDeque<String>,
    state: RunState,
}

impl<'a, R, W> FetchLoop<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    /// Creates an idle loop.
    pub fn new(
        config: &'a RunConfig,
        transport: &'a mut dyn Transport,
        input: R,
        output: W,
    ) -> Self {
        Self {
            config,
            transport,
            requests: RequestBuilder::new(config.body.clone(), config.headers.clone()),
            sink: FileSink::new(config.folder.clone()),
            metrics: RunMetrics::new(),
            reporter: Reporter::new(output, config.quiet),
            input: input.lines(),
            pending: VecDeque::new(),
            state: RunState::Idle,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Metrics gathered so far.
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// The report writer.
    pub fn output(&self) -> &W {
        self.reporter.get_ref()
    }

    /// Connects to `target` and runs until completion or the first fatal error.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] that aborted the run: a transport failure
    /// (unless it is a tolerated version mismatch), a fatal status, a file
    /// write failure, or an input/output stream failure.
    pub async fn run(&mut self, target: &Url) -> Result<RunSummary, FetchError> {
        self.state = RunState::Running;
        let result = self.drive(target).await;
        self.state = if result.is_ok() {
            RunState::Completed
        } else {
            RunState::Aborted
        };
        result
    }

    async fn drive(&mut self, target: &Url) -> Result<RunSummary, FetchError> {
        let config = self.config;
        info!(
            mode = config.mode.label(),
            transport = self.transport.name(),
            target = %target,
            "starting run"
        );

        let result = match self.transport.connect(target).await {
            Ok(()) => {
                self.metrics.start();
                match &config.mode {
                    RunMode::Benchmark {
                        template,
                        max_segments,
                        max_repeats,
                    } => {
                        self.run_benchmark(template, *max_segments, *max_repeats)
                            .await
                    }
                    RunMode::Interactive => self.run_interactive().await,
                }
            }
            Err(source) => Err(FetchError::transport(target.as_str(), source)),
        };

        let end = match result {
            Ok(end) => end,
            Err(error) if config.version_mismatch_ok && error.is_version_mismatch() => {
                warn!(error = %error, "protocol version mismatch tolerated");
                RunEnd::VersionMismatchTolerated
            }
            Err(error) => {
                self.metrics.stop();
                return Err(error);
            }
        };
        self.finish(end)
    }

    async fn run_benchmark(
        &mut self,
        template: &UrlTemplate,
        max_segments: u32,
        max_repeats: u32,
    ) -> Result<RunEnd, FetchError> {
        for run_no in 1..=max_repeats {
            info!(run_no, max_repeats, "starting repeat");
            for segment_no in 1..=max_segments {
                let url = template.render(segment_no);
                debug!(run_no, segment_no, url = %url, "fetching segment");
                self.process_url(&url).await?;
            }
        }
        Ok(RunEnd::Finished)
    }

    async fn run_interactive(&mut self) -> Result<RunEnd, FetchError> {
        while let Some(token) = self.next_token().await? {
            if token == EXIT_COMMAND {
                self.reporter.exiting().map_err(FetchError::Output)?;
                return Ok(RunEnd::ExitCommand);
            }
            self.process_url(&token).await?;
        }
        info!("input closed");
        Ok(RunEnd::EndOfInput)
    }

    /// Next whitespace-separated token from the input, or `None` at end of input.
    async fn next_token(&mut self) -> Result<Option<String>, FetchError> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(Some(token));
            }
            match self.input.next_line().await.map_err(FetchError::Input)? {
                Some(line) => self
                    .pending
                    .extend(line.split_whitespace().map(str::to_string)),
                None => return Ok(None),
            }
        }
    }

    #[instrument(skip(self), fields(url = %url))]
    async fn process_url(&mut self, url: &str) -> Result<Outcome, FetchError> {
        let config = self.config;
        let request = self.requests.build(url)?;
        if config.hex_dump {
            self.reporter
                .dump("request body", &request.body)
                .map_err(FetchError::Output)?;
        }

        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let outcome = Outcome::classify(response.status, config.redirect_is_success);
        if outcome.is_fatal() {
            self.reporter
                .rejected(response.status, outcome)
                .map_err(FetchError::Output)?;
            return Err(FetchError::status(url, response.status, outcome));
        }

        if config.hex_dump {
            self.reporter
                .dump("response body", &response.body)
                .map_err(FetchError::Output)?;
        }
        let size = response.body.len() as u64;
        if config.write_files {
            self.sink.write(url, &response.body).await?;
        }
        self.metrics.record_bytes(size);
        debug!(status = response.status, %outcome, bytes = size, "request complete");

        self.reporter
            .accepted(response.status, outcome, size, self.metrics.total_bytes())
            .map_err(FetchError::Output)?;
        Ok(outcome)
    }

    fn finish(&mut self, end: RunEnd) -> Result<RunSummary, FetchError> {
        if self.metrics.started_at().is_some() {
            let elapsed = self.metrics.stop();
            self.reporter
                .summary(&self.metrics)
                .map_err(FetchError::Output)?;
            info!(
                requests = self.metrics.requests(),
                total_bytes = self.metrics.total_bytes(),
                elapsed_secs = elapsed.as_secs_f64(),
                ?end,
                "run complete"
            );
        }

        Ok(RunSummary {
            mode: self.config.mode.label(),
            end,
            requests: self.metrics.requests(),
            total_bytes: self.metrics.total_bytes(),
            started_at: format_time(self.metrics.started_at()),
            finished_at: format_time(self.metrics.finished_at()),
            elapsed_secs: self.metrics.elapsed().as_secs_f64(),
            throughput_bytes_per_sec: self.metrics.throughput(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::fetch::{Method, RequestDescriptor};
    use crate::transport::{ResponseResult, TransportError};

    /// Answers every URL with its own text as body, unless a status is scripted.
    #[derive(Default)]
    struct ScriptedTransport {
        statuses: HashMap<String, u16>,
        connect_error: Option<TransportError>,
        sent: Mutex<Vec<(Method, String)>>,
    }

    impl ScriptedTransport {
        fn with_status(mut self, url: &str, status: u16) -> Self {
            self.statuses.insert(url.to_string(), status);
            self
        }

        fn sent_urls(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, url)| url.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn connect(&mut self, _target: &Url) -> Result<(), TransportError> {
            match self.connect_error.take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }

        async fn send(
            &self,
            request: &RequestDescriptor,
        ) -> Result<ResponseResult, TransportError> {
            let url = request.url.to_string();
            self.sent.lock().unwrap().push((request.method, url.clone()));
            let status = self.statuses.get(&url).copied().unwrap_or(200);
            Ok(ResponseResult::new(status, url.into_bytes()))
        }
    }

    fn target() -> Url {
        Url::parse("http://h/").unwrap()
    }

    fn benchmark_config(dir: &TempDir, segments: u32, repeats: u32) -> RunConfig {
        RunConfig::new(dir.path())
            .benchmark("http://h/segment.ts", segments, repeats)
            .unwrap()
    }

    fn text(output: &[u8]) -> String {
        String::from_utf8(output.to_vec()).unwrap()
    }

    // ==================== Benchmark Mode Tests ====================

    #[tokio::test]
    async fn test_benchmark_issues_requests_in_order() {
        let dir = TempDir::new().unwrap();
        let config = benchmark_config(&dir, 3, 2);
        let mut transport = ScriptedTransport::default();

        let mut fetch_loop = FetchLoop::new(&config, &mut transport, &b""[..], Vec::new());
        let summary = fetch_loop.run(&target()).await.unwrap();
        assert_eq!(fetch_loop.state(), RunState::Completed);
        drop(fetch_loop);

        let expected: Vec<String> = [1, 2, 3, 1, 2, 3]
            .iter()
            .map(|n| format!("http://h/{n}.ts"))
            .collect();
        assert_eq!(transport.sent_urls(), expected);
        assert_eq!(summary.requests, 6);
        assert_eq!(summary.end, RunEnd::Finished);
        assert_eq!(summary.total_bytes, 6 * "http://h/1.ts".len() as u64);
        assert_eq!(
            std::fs::read(dir.path().join("3.ts")).unwrap(),
            b"http://h/3.ts"
        );
    }

    #[tokio::test]
    async fn test_benchmark_double_digit_segments_render_correctly() {
        let dir = TempDir::new().unwrap();
        let config = benchmark_config(&dir, 12, 1);
        let mut transport = ScriptedTransport::default();

        FetchLoop::new(&config, &mut transport, &b""[..], Vec::new())
            .run(&target())
            .await
            .unwrap();

        let sent = transport.sent_urls();
        assert_eq!(sent.len(), 12);
        assert_eq!(sent[9], "http://h/10.ts");
        assert_eq!(sent[11], "http://h/12.ts");
        assert!(dir.path().join("12.ts").exists());
    }

    #[tokio::test]
    async fn test_benchmark_failure_status_aborts_run() {
        let dir = TempDir::new().unwrap();
        let config = benchmark_config(&dir, 5, 2);
        let mut transport = ScriptedTransport::default().with_status("http://h/2.ts", 404);

        let mut fetch_loop = FetchLoop::new(&config, &mut transport, &b""[..], Vec::new());
        let err = fetch_loop.run(&target()).await.unwrap_err();
        assert_eq!(fetch_loop.state(), RunState::Aborted);
        assert_eq!(fetch_loop.metrics().requests(), 1);
        let output = text(fetch_loop.output());
        drop(fetch_loop);

        match err {
            FetchError::Status {
                url,
                status,
                outcome,
            } => {
                assert_eq!(url, "http://h/2.ts");
                assert_eq!(status, 404);
                assert_eq!(outcome, Outcome::Failure);
            }
            other => panic!("expected Status error, got {other:?}"),
        }
        assert_eq!(transport.sent_urls().len(), 2);
        assert!(!dir.path().join("2.ts").exists());
        assert!(output.ends_with("Request failed (404).\n"), "{output}");
    }

    #[tokio::test]
    async fn test_redirect_accepted_when_policy_allows() {
        let dir = TempDir::new().unwrap();
        let config = benchmark_config(&dir, 2, 1).with_redirect_is_success(true);
        let mut transport = ScriptedTransport::default().with_status("http://h/1.ts", 302);

        let mut fetch_loop = FetchLoop::new(&config, &mut transport, &b""[..], Vec::new());
        let summary = fetch_loop.run(&target()).await.unwrap();

        assert_eq!(summary.requests, 2);
        assert!(text(fetch_loop.output()).contains("Request succeeded (redirect 302)."));
    }

    #[tokio::test]
    async fn test_redirect_rejected_by_default() {
        let dir = TempDir::new().unwrap();
        let config = benchmark_config(&dir, 2, 1);
        let mut transport = ScriptedTransport::default().with_status("http://h/1.ts", 301);

        let err = FetchLoop::new(&config, &mut transport, &b""[..], Vec::new())
            .run(&target())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FetchError::Status {
                outcome: Outcome::RedirectFailure,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_write_disabled_still_counts_bytes() {
        let dir = TempDir::new().unwrap();
        let config = benchmark_config(&dir, 2, 1).with_write_files(false);
        let mut transport = ScriptedTransport::default();

        let summary = FetchLoop::new(&config, &mut transport, &b""[..], Vec::new())
            .run(&target())
            .await
            .unwrap();

        assert_eq!(summary.total_bytes, 2 * "http://h/1.ts".len() as u64);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unwritable_folder_aborts_with_io_error() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig::new(dir.path().join("missing"))
            .benchmark("http://h/segment.ts", 3, 1)
            .unwrap();
        let mut transport = ScriptedTransport::default();

        let mut fetch_loop = FetchLoop::new(&config, &mut transport, &b""[..], Vec::new());
        let err = fetch_loop.run(&target()).await.unwrap_err();

        assert!(matches!(err, FetchError::Io { .. }), "got {err:?}");
        assert_eq!(fetch_loop.state(), RunState::Aborted);
        drop(fetch_loop);
        assert_eq!(transport.sent_urls().len(), 1);
    }

    #[tokio::test]
    async fn test_post_used_when_body_present() {
        let dir = TempDir::new().unwrap();
        let config = benchmark_config(&dir, 1, 1).with_body(b"q=1".to_vec());
        let mut transport = ScriptedTransport::default();

        FetchLoop::new(&config, &mut transport, &b""[..], Vec::new())
            .run(&target())
            .await
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].0, Method::Post);
    }

    // ==================== Interactive Mode Tests ====================

    #[tokio::test]
    async fn test_interactive_exit_first_completes_with_zero_bytes() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig::new(dir.path());
        let mut transport = ScriptedTransport::default();

        let mut fetch_loop = FetchLoop::new(&config, &mut transport, &b"exit\n"[..], Vec::new());
        let summary = fetch_loop.run(&target()).await.unwrap();

        assert_eq!(fetch_loop.state(), RunState::Completed);
        assert_eq!(summary.end, RunEnd::ExitCommand);
        assert_eq!(summary.total_bytes, 0);
        let output = text(fetch_loop.output());
        assert!(output.starts_with("Exiting...\n"), "{output}");
        assert!(output.contains("sum of total downloaded bytes: 0"), "{output}");
    }

    #[tokio::test]
    async fn test_interactive_processes_tokens_until_exit() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig::new(dir.path());
        let mut transport = ScriptedTransport::default();
        let input = b"http://h/a/1.m4s\n\n  http://h/b/2.m4s exit http://h/never.m4s\n";

        let mut fetch_loop = FetchLoop::new(&config, &mut transport, &input[..], Vec::new());
        let summary = fetch_loop.run(&target()).await.unwrap();
        let output = text(fetch_loop.output());
        drop(fetch_loop);

        assert_eq!(
            transport.sent_urls(),
            vec!["http://h/a/1.m4s".to_string(), "http://h/b/2.m4s".to_string()]
        );
        assert_eq!(summary.requests, 2);
        assert!(dir.path().join("1.m4s").exists());
        assert!(dir.path().join("2.m4s").exists());
        assert!(
            output.contains("file_size_start:16:file_size_end total_downloaded : 16 "),
            "{output}"
        );
        assert!(
            output.contains("file_size_start:16:file_size_end total_downloaded : 32 "),
            "{output}"
        );
    }

    #[tokio::test]
    async fn test_interactive_end_of_input_completes() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig::new(dir.path());
        let mut transport = ScriptedTransport::default();

        let summary = FetchLoop::new(&config, &mut transport, &b"http://h/1.ts"[..], Vec::new())
            .run(&target())
            .await
            .unwrap();

        assert_eq!(summary.end, RunEnd::EndOfInput);
        assert_eq!(summary.requests, 1);
    }

    #[tokio::test]
    async fn test_interactive_failure_aborts() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig::new(dir.path());
        let mut transport = ScriptedTransport::default().with_status("http://h/1.ts", 500);

        let mut fetch_loop = FetchLoop::new(
            &config,
            &mut transport,
            &b"http://h/1.ts\nhttp://h/2.ts\nexit\n"[..],
            Vec::new(),
        );
        let err = fetch_loop.run(&target()).await.unwrap_err();
        drop(fetch_loop);

        assert!(matches!(err, FetchError::Status { status: 500, .. }));
        assert_eq!(transport.sent_urls(), vec!["http://h/1.ts".to_string()]);
    }

    #[tokio::test]
    async fn test_interactive_invalid_url_aborts() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig::new(dir.path());
        let mut transport = ScriptedTransport::default();

        let err = FetchLoop::new(&config, &mut transport, &b"garbage\n"[..], Vec::new())
            .run(&target())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_hex_dump_output() {
        let dir = TempDir::new().unwrap();
        let mut config = RunConfig::new(dir.path()).with_body(b"AB".to_vec());
        config.hex_dump = true;
        let mut transport = ScriptedTransport::default();

        let mut fetch_loop =
            FetchLoop::new(&config, &mut transport, &b"http://h/1.ts exit"[..], Vec::new());
        fetch_loop.run(&target()).await.unwrap();
        let output = text(fetch_loop.output());

        assert!(output.contains("request body:\n0x0000:  41 42"), "{output}");
        assert!(output.contains("response body:\n0x0000:  68 74 74 70"), "{output}");
    }

    // ==================== Connect Tests ====================

    #[tokio::test]
    async fn test_connect_failure_aborts_before_any_request() {
        let dir = TempDir::new().unwrap();
        let config = benchmark_config(&dir, 3, 1);
        let mut transport = ScriptedTransport {
            connect_error: Some(TransportError::timeout("h:80")),
            ..ScriptedTransport::default()
        };

        let mut fetch_loop = FetchLoop::new(&config, &mut transport, &b""[..], Vec::new());
        let err = fetch_loop.run(&target()).await.unwrap_err();
        assert_eq!(fetch_loop.state(), RunState::Aborted);
        drop(fetch_loop);

        assert!(matches!(err, FetchError::Transport { .. }));
        assert!(transport.sent_urls().is_empty());
    }

    #[tokio::test]
    async fn test_version_mismatch_tolerated_completes_cleanly() {
        let dir = TempDir::new().unwrap();
        let config = benchmark_config(&dir, 3, 1).with_version_mismatch_ok(true);
        let mut transport = ScriptedTransport {
            connect_error: Some(TransportError::version_mismatch("HTTP/2", "HTTP/1.1")),
            ..ScriptedTransport::default()
        };

        let mut fetch_loop = FetchLoop::new(&config, &mut transport, &b""[..], Vec::new());
        let summary = fetch_loop.run(&target()).await.unwrap();

        assert_eq!(fetch_loop.state(), RunState::Completed);
        assert_eq!(summary.end, RunEnd::VersionMismatchTolerated);
        assert_eq!(summary.requests, 0);
        assert!(fetch_loop.output().is_empty());
    }

    #[tokio::test]
    async fn test_version_mismatch_without_tolerance_aborts() {
        let dir = TempDir::new().unwrap();
        let config = benchmark_config(&dir, 3, 1);
        let mut transport = ScriptedTransport {
            connect_error: Some(TransportError::version_mismatch("HTTP/2", "HTTP/1.1")),
            ..ScriptedTransport::default()
        };

        let err = FetchLoop::new(&config, &mut transport, &b""[..], Vec::new())
            .run(&target())
            .await
            .unwrap_err();

        assert!(err.is_version_mismatch());
    }

    #[test]
    fn test_summary_serializes_snake_case_end() {
        let summary = RunSummary {
            mode: "benchmark",
            end: RunEnd::VersionMismatchTolerated,
            requests: 0,
            total_bytes: 0,
            started_at: "-".to_string(),
            finished_at: "-".to_string(),
            elapsed_secs: 0.0,
            throughput_bytes_per_sec: 0.0,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["end"], "version_mismatch_tolerated");
        assert_eq!(json["mode"], "benchmark");
    }
}
