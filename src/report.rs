//! Line-oriented run report written to stdout.
//!
//! Driving processes parse these lines (notably the
//! `file_size_start:<n>:file_size_end` marker), so the wording is stable.
//! Diagnostics go through `tracing` on stderr instead.

use std::io::{self, Write};
use std::time::SystemTime;

use crate::fetch::{Outcome, RunMetrics};

/// Bytes per hex dump row.
const HEX_DUMP_WIDTH: usize = 16;

/// Writes per-request and per-run report lines.
#[derive(Debug)]
pub struct Reporter<W> {
    out: W,
    quiet: bool,
}

impl<W: Write> Reporter<W> {
    /// Creates a reporter writing to `out`.
    pub fn new(out: W, quiet: bool) -> Self {
        Self { out, quiet }
    }

    /// The underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Consumes the reporter, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Reports one accepted response.
    ///
    /// `written` is the body size; it is omitted in quiet mode.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn accepted(
        &mut self,
        status: u16,
        outcome: Outcome,
        written: u64,
        total: u64,
    ) -> io::Result<()> {
        if !self.quiet {
            write!(
                self.out,
                "file_size_start:{written}:file_size_end total_downloaded : {total} "
            )?;
        }
        if outcome.is_redirect() {
            writeln!(self.out, "Request succeeded (redirect {status}).")?;
        } else {
            writeln!(self.out, "Request succeeded ({status}).")?;
        }
        self.out.flush()
    }

    /// Reports a response that ends the run.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn rejected(&mut self, status: u16, outcome: Outcome) -> io::Result<()> {
        if outcome.is_redirect() {
            writeln!(self.out, "Request failed (redirect {status}).")?;
        } else {
            writeln!(self.out, "Request failed ({status}).")?;
        }
        self.out.flush()
    }

    /// Dumps `bytes` in hex under `label`, unless quiet.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn dump(&mut self, label: &str, bytes: &[u8]) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(self.out, "{label}:\n{}", hex_dump(bytes))
    }

    /// Acknowledges the exit command.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn exiting(&mut self) -> io::Result<()> {
        writeln!(self.out, "Exiting...")?;
        self.out.flush()
    }

    /// Writes the end-of-run summary.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn summary(&mut self, metrics: &RunMetrics) -> io::Result<()> {
        writeln!(self.out, "started at {}", format_time(metrics.started_at()))?;
        writeln!(
            self.out,
            "finished at {} elapsed time: {:.6}",
            format_time(metrics.finished_at()),
            metrics.elapsed().as_secs_f64()
        )?;
        writeln!(
            self.out,
            "sum of total downloaded bytes: {}",
            metrics.total_bytes()
        )?;
        self.out.flush()
    }
}

/// Formats an optional wall-clock time as an HTTP date.
#[must_use]
pub fn format_time(time: Option<SystemTime>) -> String {
    time.map_or_else(|| "-".to_string(), httpdate::fmt_http_date)
}

/// Classic offset / hex / ASCII dump, sixteen bytes per row.
#[must_use]
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut dump = String::new();
    for (row, chunk) in bytes.chunks(HEX_DUMP_WIDTH).enumerate() {
        let encoded = hex::encode(chunk);
        let pairs: Vec<&str> = encoded
            .as_bytes()
            .chunks(2)
            .filter_map(|pair| std::str::from_utf8(pair).ok())
            .collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        dump.push_str(&format!(
            "0x{:04x}:  {:<width$}  {ascii}\n",
            row * HEX_DUMP_WIDTH,
            pairs.join(" "),
            width = HEX_DUMP_WIDTH * 3 - 1
        ));
    }
    dump
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn output(reporter: Reporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_accepted_line_carries_size_markers() {
        let mut reporter = Reporter::new(Vec::new(), false);
        reporter.accepted(200, Outcome::Success, 42, 142).unwrap();
        assert_eq!(
            output(reporter),
            "file_size_start:42:file_size_end total_downloaded : 142 Request succeeded (200).\n"
        );
    }

    #[test]
    fn test_accepted_redirect_wording() {
        let mut reporter = Reporter::new(Vec::new(), false);
        reporter
            .accepted(301, Outcome::RedirectSuccess, 0, 0)
            .unwrap();
        assert!(output(reporter).ends_with("Request succeeded (redirect 301).\n"));
    }

    #[test]
    fn test_quiet_drops_size_markers_and_dumps() {
        let mut reporter = Reporter::new(Vec::new(), true);
        reporter.accepted(200, Outcome::Success, 5, 5).unwrap();
        reporter.dump("body", b"hello").unwrap();
        assert_eq!(output(reporter), "Request succeeded (200).\n");
    }

    #[test]
    fn test_rejected_lines() {
        let mut reporter = Reporter::new(Vec::new(), false);
        reporter.rejected(404, Outcome::Failure).unwrap();
        reporter.rejected(302, Outcome::RedirectFailure).unwrap();
        assert_eq!(
            output(reporter),
            "Request failed (404).\nRequest failed (redirect 302).\n"
        );
    }

    #[test]
    fn test_summary_reports_total_bytes() {
        let mut metrics = RunMetrics::new();
        metrics.start();
        metrics.record_bytes(10);
        metrics.stop();
        let mut reporter = Reporter::new(Vec::new(), false);
        reporter.summary(&metrics).unwrap();
        let text = output(reporter);
        assert!(text.contains("started at "), "{text}");
        assert!(text.contains("GMT"), "{text}");
        assert!(text.contains("elapsed time: "), "{text}");
        assert!(text.ends_with("sum of total downloaded bytes: 10\n"), "{text}");
    }

    #[test]
    fn test_format_time_missing() {
        assert_eq!(format_time(None), "-");
    }

    #[test]
    fn test_hex_dump_rows() {
        let dump = hex_dump(b"Hello, segment!\x00\x01");
        let rows: Vec<&str> = dump.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("0x0000:  48 65 6c 6c 6f"), "{}", rows[0]);
        assert!(rows[0].ends_with("Hello, segment!."), "{}", rows[0]);
        assert!(rows[1].starts_with("0x0010:  01"), "{}", rows[1]);
        assert!(rows[1].ends_with("."), "{}", rows[1]);
    }

    #[test]
    fn test_hex_dump_empty() {
        assert!(hex_dump(b"").is_empty());
    }
}
