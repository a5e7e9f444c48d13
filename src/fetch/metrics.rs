//! Byte and timing bookkeeping for one run.

use std::time::{Duration, Instant, SystemTime};

/// Accumulated metrics for one run.
///
/// `start`/`stop` bracket the whole run, not individual requests. Counters
/// only ever grow.
#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    total_bytes: u64,
    requests: u64,
    started: Option<(Instant, SystemTime)>,
    finished: Option<(Instant, SystemTime)>,
}

impl RunMetrics {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of the run.
    pub fn start(&mut self) {
        self.started = Some((Instant::now(), SystemTime::now()));
        self.finished = None;
    }

    /// Records one completed request that downloaded `bytes`.
    pub fn record_bytes(&mut self, bytes: u64) {
        self.total_bytes = self.total_bytes.saturating_add(bytes);
        self.requests += 1;
    }

    /// Marks the end of the run and returns the elapsed time.
    pub fn stop(&mut self) -> Duration {
        self.finished = Some((Instant::now(), SystemTime::now()));
        self.elapsed()
    }

    /// Total bytes downloaded so far.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Requests recorded so far.
    #[must_use]
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Time between start and stop, or start and now while running.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.finished) {
            (Some((start, _)), Some((end, _))) => end.duration_since(start),
            (Some((start, _)), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Wall-clock start time.
    #[must_use]
    pub fn started_at(&self) -> Option<SystemTime> {
        self.started.map(|(_, wall)| wall)
    }

    /// Wall-clock finish time.
    #[must_use]
    pub fn finished_at(&self) -> Option<SystemTime> {
        self.finished.map(|(_, wall)| wall)
    }

    /// Bytes per second over the elapsed time; zero before any time has passed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.total_bytes as f64 / secs
        } else {
            0.0
        }
    }
}
