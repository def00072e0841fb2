//! Runtime metrics for the recognition core
//!
//! Counters and timings are kept in-memory and can be dumped by the CLI
//! (`--log-level debug` logs a summary on exit) or inspected in tests.
//!
//! ## Metrics Tracked
//!
//! - Tokens recognised and re-classified through span propagation
//! - Mistake and suggestion passes, cancelled and failed passes
//! - Language switches
//! - Per-operation latencies (`recognize`, `apply_edit`, `reclassify_all`, ...)
//!
//! ## Design
//!
//! - Lock-free atomic counters for per-keystroke operations
//! - DashMap for low-contention histogram storage, keeping only the most
//!   recent [`MAX_TIMING_SAMPLES`] durations per operation

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Timing samples kept per operation; older samples are dropped first.
pub const MAX_TIMING_SAMPLES: usize = 1024;

/// Global metrics registry (singleton)
static METRICS: once_cell::sync::Lazy<Arc<Metrics>> =
    once_cell::sync::Lazy::new(|| Arc::new(Metrics::new()));

/// Get the global metrics instance
pub fn metrics() -> &'static Arc<Metrics> {
    &METRICS
}

#[derive(Debug)]
pub struct Metrics {
    tokens_recognized: AtomicU64,
    propagated_reclassifications: AtomicU64,

    mistake_passes: AtomicU64,
    suggestion_passes: AtomicU64,
    cancelled_passes: AtomicU64,
    failed_passes: AtomicU64,

    language_switches: AtomicU64,

    // operation name -> recent durations in microseconds, oldest first
    operation_timings: DashMap<String, VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tokens_recognized: AtomicU64::new(0),
            propagated_reclassifications: AtomicU64::new(0),
            mistake_passes: AtomicU64::new(0),
            suggestion_passes: AtomicU64::new(0),
            cancelled_passes: AtomicU64::new(0),
            failed_passes: AtomicU64::new(0),
            language_switches: AtomicU64::new(0),
            operation_timings: DashMap::new(),
        }
    }

    /// Records a token extracted and classified at an edit site
    pub fn record_token_recognized(&self) {
        self.tokens_recognized.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a follower token whose classification changed through propagation
    pub fn record_propagated(&self) {
        self.propagated_reclassifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mistake_pass(&self) {
        self.mistake_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suggestion_pass(&self) {
        self.suggestion_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled_pass(&self) {
        self.cancelled_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_pass(&self) {
        self.failed_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_language_switch(&self) {
        self.language_switches.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the timing of an operation
    pub fn record_timing(&self, operation: &str, duration: Duration) {
        let micros = duration.as_micros() as u64;

        let mut samples = self
            .operation_timings
            .entry(operation.to_string())
            .or_default();
        if samples.len() == MAX_TIMING_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(micros);
    }

    /// Gets summary statistics over the retained samples of an operation
    pub fn operation_stats(&self, operation: &str) -> Option<OperationStats> {
        self.operation_timings.get(operation).map(|timings| {
            let mut sorted: Vec<u64> = timings.value().iter().copied().collect();
            sorted.sort_unstable();

            let count = sorted.len();
            if count == 0 {
                return OperationStats::default();
            }

            let sum: u64 = sorted.iter().sum();
            let p95_idx = (count as f64 * 0.95) as usize;
            let p99_idx = (count as f64 * 0.99) as usize;

            OperationStats {
                count,
                min_micros: sorted[0],
                max_micros: sorted[count - 1],
                mean_micros: sum / count as u64,
                p50_micros: sorted[count / 2],
                p95_micros: sorted[p95_idx.min(count - 1)],
                p99_micros: sorted[p99_idx.min(count - 1)],
            }
        })
    }

    /// Gets a summary report of all counters
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            tokens_recognized: self.tokens_recognized.load(Ordering::Relaxed),
            propagated_reclassifications: self.propagated_reclassifications.load(Ordering::Relaxed),
            mistake_passes: self.mistake_passes.load(Ordering::Relaxed),
            suggestion_passes: self.suggestion_passes.load(Ordering::Relaxed),
            cancelled_passes: self.cancelled_passes.load(Ordering::Relaxed),
            failed_passes: self.failed_passes.load(Ordering::Relaxed),
            language_switches: self.language_switches.load(Ordering::Relaxed),
        }
    }

    /// Resets all metrics (useful for testing)
    pub fn reset(&self) {
        self.tokens_recognized.store(0, Ordering::Relaxed);
        self.propagated_reclassifications.store(0, Ordering::Relaxed);
        self.mistake_passes.store(0, Ordering::Relaxed);
        self.suggestion_passes.store(0, Ordering::Relaxed);
        self.cancelled_passes.store(0, Ordering::Relaxed);
        self.failed_passes.store(0, Ordering::Relaxed);
        self.language_switches.store(0, Ordering::Relaxed);
        self.operation_timings.clear();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for a single operation
#[derive(Debug, Clone, Default)]
pub struct OperationStats {
    pub count: usize,
    pub min_micros: u64,
    pub max_micros: u64,
    pub mean_micros: u64,
    pub p50_micros: u64, // Median
    pub p95_micros: u64,
    pub p99_micros: u64,
}

/// Summary of all counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSummary {
    pub tokens_recognized: u64,
    pub propagated_reclassifications: u64,
    pub mistake_passes: u64,
    pub suggestion_passes: u64,
    pub cancelled_passes: u64,
    pub failed_passes: u64,
    pub language_switches: u64,
}

/// RAII guard for automatic timing measurement
///
/// Records the duration of a scope into the global registry when dropped.
///
/// ```
/// use pseudocode_editor::metrics::TimingGuard;
///
/// fn rescan() {
///     let _guard = TimingGuard::new("rescan");
///     // ... do work ...
/// }
/// ```
pub struct TimingGuard {
    operation: &'static str,
    start: Instant,
}

impl TimingGuard {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        metrics().record_timing(self.operation, self.start.elapsed());
    }
}
