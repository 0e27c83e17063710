//! Scheduler counters and cycle latency

use crate::report::CycleReport;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cycle latency bucket bounds in microseconds
const LATENCY_BUCKETS_US: [u64; 10] = [
    100, 500, 1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000, 5_000_000,
];

/// Histogram for tracking value distributions
pub struct Histogram {
    /// Bucket upper bounds
    buckets: Vec<u64>,
    /// Counts per bucket, plus one for values above the last bound
    counts: Vec<AtomicU64>,
    /// Sum of all values
    sum: AtomicU64,
    /// Total count
    count: AtomicU64,
}

impl Histogram {
    /// Create histogram with custom buckets
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = (0..=buckets.len()).map(|_| AtomicU64::new(0)).collect();
        Histogram {
            buckets,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value
    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, boundary) in self.buckets.iter().enumerate() {
            if value <= *boundary {
                self.counts[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets
        if let Some(last) = self.counts.last() {
            last.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get mean value
    pub fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Get total count
    pub fn total_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// `(upper bound, count)` per bucket
    ///
    /// The final entry, bounded by `u64::MAX`, counts overflow values.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        self.buckets
            .iter()
            .chain(std::iter::once(&u64::MAX))
            .zip(&self.counts)
            .map(|(bound, count)| (*bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::with_buckets(LATENCY_BUCKETS_US.to_vec())
    }
}

/// Lifetime counters of one execution manager
#[derive(Default)]
pub struct SchedulerMetrics {
    cycles: AtomicU64,
    aborted_cycles: AtomicU64,
    transactions: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    components: AtomicU64,
    solo_executions: AtomicU64,
    color_phases: AtomicU64,
    widest_phase: AtomicU64,
    cycle_latency_us: Histogram,
}

impl SchedulerMetrics {
    /// Create an empty metrics set
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a completed cycle
    pub fn record_cycle(&self, report: &CycleReport) {
        let stats = &report.stats;
        let failed = report.failures().count() as u64;

        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.transactions
            .fetch_add(report.len() as u64, Ordering::Relaxed);
        self.executed
            .fetch_add(report.len() as u64 - failed, Ordering::Relaxed);
        self.failed.fetch_add(failed, Ordering::Relaxed);
        self.components
            .fetch_add(stats.components as u64, Ordering::Relaxed);
        self.solo_executions
            .fetch_add(stats.solo_executions as u64, Ordering::Relaxed);
        self.color_phases
            .fetch_add(stats.color_phases as u64, Ordering::Relaxed);
        self.widest_phase
            .fetch_max(stats.widest_phase as u64, Ordering::Relaxed);
        self.cycle_latency_us
            .observe(stats.elapsed.as_micros() as u64);
    }

    /// Account for a cycle that ended in a scheduler error
    pub fn record_abort(&self) {
        self.aborted_cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            aborted_cycles: self.aborted_cycles.load(Ordering::Relaxed),
            transactions: self.transactions.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            components: self.components.load(Ordering::Relaxed),
            solo_executions: self.solo_executions.load(Ordering::Relaxed),
            color_phases: self.color_phases.load(Ordering::Relaxed),
            widest_phase: self.widest_phase.load(Ordering::Relaxed),
            mean_cycle_us: self.cycle_latency_us.mean(),
            cycle_latency_buckets: self.cycle_latency_us.buckets(),
        }
    }
}

/// Snapshot of all metrics at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Completed cycles
    pub cycles: u64,
    /// Cycles ended by a scheduler error
    pub aborted_cycles: u64,
    /// Transactions drained by completed cycles
    pub transactions: u64,
    /// Successful executions
    pub executed: u64,
    /// Executions the executor rejected
    pub failed: u64,
    /// Components examined
    pub components: u64,
    /// Pivot executions
    pub solo_executions: u64,
    /// Non-empty color phases
    pub color_phases: u64,
    /// Largest color phase seen
    pub widest_phase: u64,
    /// Mean cycle wall time
    pub mean_cycle_us: f64,
    /// `(upper bound us, count)` per latency bucket
    pub cycle_latency_buckets: Vec<(u64, u64)>,
}

impl MetricsSnapshot {
    /// Export snapshot as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
