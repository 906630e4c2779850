//! Run-wide check recording and threshold evaluation
//!
//! Worker loops record named pass/fail checks and error counters here. At
//! the end of the run the recorder is snapshotted into a `RunSummary`, whose
//! threshold evaluation decides the process exit status.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::info;

use crate::utils::format_count;

/// Check recorded by producers after each publish attempt
pub const CHECK_PRODUCE_SUCCESSFUL: &str = "produce successful";
/// Check recorded by consumers when a fetch returned at least one message
pub const CHECK_RECEIVED_MESSAGES: &str = "received messages";
/// Check recorded by consumers when every fetched message had a key and value
pub const CHECK_ALL_MESSAGES_VALID: &str = "all messages valid";
/// Check recorded by consumers when a fetch attempt failed outright
pub const CHECK_CONSUMER_ERROR: &str = "consumer error";

/// Pass/fail tally for one named check
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckStats {
    pub passed: u64,
    pub failed: u64,
}

impl CheckStats {
    pub fn total(&self) -> u64 {
        self.passed + self.failed
    }

    /// Pass percentage in 0..=100; zero-sample checks report 0
    pub fn pass_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.passed as f64 / self.total() as f64 * 100.0
        }
    }
}

/// Shared sink for everything the workers observe during a run
///
/// Cloning is cheap: all state lives behind `Arc`s so every worker task can
/// hold its own handle.
#[derive(Clone)]
pub struct RunRecorder {
    /// Named pass/fail tallies in first-recorded order
    checks: Arc<Mutex<IndexMap<&'static str, CheckStats>>>,
    /// Failed publish attempts across the producer population
    pub writer_errors: Arc<AtomicU64>,
    /// Failed fetch attempts across the consumer population
    pub reader_errors: Arc<AtomicU64>,
    /// Messages successfully handed to the broker
    pub messages_produced: Arc<AtomicU64>,
    /// Messages received back from the broker
    pub messages_consumed: Arc<AtomicU64>,
    /// Currently live producer workers (maintained by the ramp scheduler)
    pub live_producers: Arc<AtomicUsize>,
    /// Currently live consumer workers (maintained by the ramp scheduler)
    pub live_consumers: Arc<AtomicUsize>,
    started: Instant,
}

impl RunRecorder {
    pub fn new() -> Self {
        Self {
            checks: Arc::new(Mutex::new(IndexMap::new())),
            writer_errors: Arc::new(AtomicU64::new(0)),
            reader_errors: Arc::new(AtomicU64::new(0)),
            messages_produced: Arc::new(AtomicU64::new(0)),
            messages_consumed: Arc::new(AtomicU64::new(0)),
            live_producers: Arc::new(AtomicUsize::new(0)),
            live_consumers: Arc::new(AtomicUsize::new(0)),
            started: Instant::now(),
        }
    }

    /// Records one pass/fail outcome under the given check name
    pub async fn check(&self, name: &'static str, passed: bool) {
        let mut checks = self.checks.lock().await;
        let stats = checks.entry(name).or_default();
        if passed {
            stats.passed += 1;
        } else {
            stats.failed += 1;
        }
    }

    /// Freezes the current state into a summary
    pub async fn snapshot(&self) -> RunSummary {
        RunSummary {
            checks: self.checks.lock().await.clone(),
            writer_errors: self.writer_errors.load(Ordering::Relaxed),
            reader_errors: self.reader_errors.load(Ordering::Relaxed),
            messages_produced: self.messages_produced.load(Ordering::Relaxed),
            messages_consumed: self.messages_consumed.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }

    /// Logs produced/consumed counts, instantaneous rates, and live worker
    /// gauges every `period` until the surrounding task is aborted
    pub async fn progress_loop(&self, period: Duration) {
        let mut ticker = interval(period);
        ticker.tick().await;

        // Rates are computed from deltas between ticks, not cumulative totals,
        // so a ramp-down is visible as a falling rate
        let mut last_produced = self.messages_produced.load(Ordering::Relaxed);
        let mut last_consumed = self.messages_consumed.load(Ordering::Relaxed);
        let mut last_tick = Instant::now();

        loop {
            ticker.tick().await;

            let produced = self.messages_produced.load(Ordering::Relaxed);
            let consumed = self.messages_consumed.load(Ordering::Relaxed);
            let now = Instant::now();
            let secs = now.duration_since(last_tick).as_secs_f64();
            if secs <= 0.0 {
                continue;
            }

            info!(
                "progress: produced {} ({:.0} msg/s), consumed {} ({:.0} msg/s), workers {}p/{}c",
                format_count(produced),
                (produced - last_produced) as f64 / secs,
                format_count(consumed),
                (consumed - last_consumed) as f64 / secs,
                self.live_producers.load(Ordering::Relaxed),
                self.live_consumers.load(Ordering::Relaxed),
            );

            last_produced = produced;
            last_consumed = consumed;
            last_tick = now;
        }
    }
}

impl Default for RunRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable end-of-run view of everything the recorder collected
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub checks: IndexMap<&'static str, CheckStats>,
    pub writer_errors: u64,
    pub reader_errors: u64,
    pub messages_produced: u64,
    pub messages_consumed: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    /// True iff no writer or reader errors were counted during the run
    pub fn thresholds_met(&self) -> bool {
        self.writer_errors == 0 && self.reader_errors == 0
    }

    /// Logs the final report
    pub fn log(&self) {
        let secs = self.elapsed.as_secs_f64().max(f64::EPSILON);

        info!("=== RUN SUMMARY ===");
        for (name, stats) in &self.checks {
            info!(
                "check '{}': {:.1}% ({} passed, {} failed)",
                name,
                stats.pass_rate(),
                stats.passed,
                stats.failed
            );
        }
        info!(
            "messages produced: {} ({:.1} msg/s), consumed: {} ({:.1} msg/s)",
            format_count(self.messages_produced),
            self.messages_produced as f64 / secs,
            format_count(self.messages_consumed),
            self.messages_consumed as f64 / secs,
        );
        info!(
            "writer errors: {}, reader errors: {}",
            self.writer_errors, self.reader_errors
        );
        if self.thresholds_met() {
            info!("thresholds met: writer and reader error counts are both zero");
        } else {
            info!("thresholds FAILED: error counts must be zero");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_tallies_accumulate() {
        let recorder = RunRecorder::new();
        recorder.check(CHECK_PRODUCE_SUCCESSFUL, true).await;
        recorder.check(CHECK_PRODUCE_SUCCESSFUL, true).await;
        recorder.check(CHECK_PRODUCE_SUCCESSFUL, false).await;
        recorder.check(CHECK_RECEIVED_MESSAGES, true).await;

        let summary = recorder.snapshot().await;
        let produce = summary.checks[CHECK_PRODUCE_SUCCESSFUL];
        assert_eq!(produce.passed, 2);
        assert_eq!(produce.failed, 1);
        assert_eq!(produce.total(), 3);
        assert_eq!(summary.checks[CHECK_RECEIVED_MESSAGES].passed, 1);
    }

    #[tokio::test]
    async fn test_checks_keep_first_recorded_order() {
        let recorder = RunRecorder::new();
        recorder.check(CHECK_RECEIVED_MESSAGES, true).await;
        recorder.check(CHECK_ALL_MESSAGES_VALID, true).await;
        recorder.check(CHECK_RECEIVED_MESSAGES, false).await;

        let summary = recorder.snapshot().await;
        let names: Vec<&str> = summary.checks.keys().copied().collect();
        assert_eq!(names, vec![CHECK_RECEIVED_MESSAGES, CHECK_ALL_MESSAGES_VALID]);
    }

    #[tokio::test]
    async fn test_recorder_clones_share_state() {
        let recorder = RunRecorder::new();
        let clone = recorder.clone();
        clone.check(CHECK_CONSUMER_ERROR, false).await;
        clone.writer_errors.fetch_add(1, Ordering::Relaxed);

        let summary = recorder.snapshot().await;
        assert_eq!(summary.checks[CHECK_CONSUMER_ERROR].failed, 1);
        assert_eq!(summary.writer_errors, 1);
    }

    #[test]
    fn test_pass_rate() {
        let stats = CheckStats {
            passed: 3,
            failed: 1,
        };
        assert!((stats.pass_rate() - 75.0).abs() < 1e-9);
        assert_eq!(CheckStats::default().pass_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_thresholds_require_zero_error_counts() {
        let recorder = RunRecorder::new();
        assert!(recorder.snapshot().await.thresholds_met());

        recorder.writer_errors.fetch_add(1, Ordering::Relaxed);
        assert!(!recorder.snapshot().await.thresholds_met());

        let recorder = RunRecorder::new();
        recorder.reader_errors.fetch_add(1, Ordering::Relaxed);
        assert!(!recorder.snapshot().await.thresholds_met());
    }

    #[tokio::test]
    async fn test_failing_checks_alone_do_not_fail_thresholds() {
        // A false check is an observation, not an error count
        let recorder = RunRecorder::new();
        recorder.check(CHECK_RECEIVED_MESSAGES, false).await;
        assert!(recorder.snapshot().await.thresholds_met());
    }
}
