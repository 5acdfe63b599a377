use crate::classify::FailureKind;
use crate::constants::UNKNOWN_ENDPOINT;
use arc_swap::ArcSwap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Lock-free running statistics for one workload run.
///
/// Every mutation is a single atomic increment so that workers never contend
/// on a lock in the hot path. Snapshots are eventually consistent across
/// fields; a reader may observe a success that is not yet reflected in the
/// total, which is fine for progress reporting.
#[derive(Debug)]
pub struct Aggregator {
    total_reads: AtomicU64,
    successful_reads: AtomicU64,
    failed_reads: AtomicU64,
    total_writes: AtomicU64,
    successful_writes: AtomicU64,
    failed_writes: AtomicU64,
    read_only_rejections: AtomicU64,
    failover_signals: AtomicU64,
    read_latency_us: AtomicU64,
    write_latency_us: AtomicU64,
    last_endpoint: ArcSwap<String>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            total_reads: AtomicU64::new(0),
            successful_reads: AtomicU64::new(0),
            failed_reads: AtomicU64::new(0),
            total_writes: AtomicU64::new(0),
            successful_writes: AtomicU64::new(0),
            failed_writes: AtomicU64::new(0),
            read_only_rejections: AtomicU64::new(0),
            failover_signals: AtomicU64::new(0),
            read_latency_us: AtomicU64::new(0),
            write_latency_us: AtomicU64::new(0),
            last_endpoint: ArcSwap::from_pointee(String::from(UNKNOWN_ENDPOINT)),
        }
    }

    /// Zero every counter for a new run. Only called by the orchestrator
    /// while no workers are live.
    pub fn reset(&self) {
        self.total_reads.store(0, Ordering::Relaxed);
        self.successful_reads.store(0, Ordering::Relaxed);
        self.failed_reads.store(0, Ordering::Relaxed);
        self.total_writes.store(0, Ordering::Relaxed);
        self.successful_writes.store(0, Ordering::Relaxed);
        self.failed_writes.store(0, Ordering::Relaxed);
        self.read_only_rejections.store(0, Ordering::Relaxed);
        self.failover_signals.store(0, Ordering::Relaxed);
        self.read_latency_us.store(0, Ordering::Relaxed);
        self.write_latency_us.store(0, Ordering::Relaxed);
        self.last_endpoint
            .store(Arc::new(String::from(UNKNOWN_ENDPOINT)));
    }

    pub fn record_read_success(&self, latency: Duration) {
        self.total_reads.fetch_add(1, Ordering::Relaxed);
        self.successful_reads.fetch_add(1, Ordering::Relaxed);
        self.read_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::counter!("bluegreen.reads.success").increment(1);
    }

    pub fn record_read_failure(&self, latency: Duration, kind: FailureKind) {
        self.total_reads.fetch_add(1, Ordering::Relaxed);
        self.failed_reads.fetch_add(1, Ordering::Relaxed);
        self.read_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.record_kind(kind);
        #[cfg(feature = "metrics")]
        metrics::counter!("bluegreen.reads.error").increment(1);
    }

    pub fn record_write_success(&self, latency: Duration) {
        self.total_writes.fetch_add(1, Ordering::Relaxed);
        self.successful_writes.fetch_add(1, Ordering::Relaxed);
        self.write_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::counter!("bluegreen.writes.success").increment(1);
    }

    pub fn record_write_failure(&self, latency: Duration, kind: FailureKind) {
        self.total_writes.fetch_add(1, Ordering::Relaxed);
        self.failed_writes.fetch_add(1, Ordering::Relaxed);
        self.write_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.record_kind(kind);
        #[cfg(feature = "metrics")]
        metrics::counter!("bluegreen.writes.error").increment(1);
    }

    fn record_kind(&self, kind: FailureKind) {
        match kind {
            FailureKind::ReadOnlyRejection => {
                self.read_only_rejections.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "metrics")]
                metrics::counter!("bluegreen.failures.read_only").increment(1);
            }
            FailureKind::FailoverSignal => {
                self.failover_signals.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "metrics")]
                metrics::counter!("bluegreen.failures.failover").increment(1);
            }
            FailureKind::Other => {}
        }
    }

    /// Record which physical node served the most recent operation.
    pub fn observe_endpoint(&self, endpoint: &str) {
        if self.last_endpoint.load().as_str() != endpoint {
            self.last_endpoint.store(Arc::new(endpoint.to_owned()));
        }
    }

    pub fn last_endpoint(&self) -> String {
        self.last_endpoint.load_full().to_string()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let total_reads = self.total_reads.load(Ordering::Relaxed);
        let successful_reads = self.successful_reads.load(Ordering::Relaxed);
        let total_writes = self.total_writes.load(Ordering::Relaxed);
        let successful_writes = self.successful_writes.load(Ordering::Relaxed);

        StatsSnapshot {
            total_reads,
            successful_reads,
            failed_reads: self.failed_reads.load(Ordering::Relaxed),
            read_success_rate: percentage(successful_reads, total_reads),
            mean_read_latency_ms: mean_millis(
                self.read_latency_us.load(Ordering::Relaxed),
                total_reads,
            ),
            total_writes,
            successful_writes,
            failed_writes: self.failed_writes.load(Ordering::Relaxed),
            write_success_rate: percentage(successful_writes, total_writes),
            mean_write_latency_ms: mean_millis(
                self.write_latency_us.load(Ordering::Relaxed),
                total_writes,
            ),
            read_only_rejections: self.read_only_rejections.load(Ordering::Relaxed),
            failover_signals: self.failover_signals.load(Ordering::Relaxed),
            last_endpoint: self.last_endpoint(),
        }
    }
}

/// Point-in-time view of the aggregator, including the derived figures the
/// status surface reports.
#[derive(Clone, Debug, Serialize)]
pub struct StatsSnapshot {
    pub total_reads: u64,
    pub successful_reads: u64,
    pub failed_reads: u64,
    pub read_success_rate: f64,
    pub mean_read_latency_ms: f64,
    pub total_writes: u64,
    pub successful_writes: u64,
    pub failed_writes: u64,
    pub write_success_rate: f64,
    pub mean_write_latency_ms: f64,
    pub read_only_rejections: u64,
    pub failover_signals: u64,
    pub last_endpoint: String,
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn mean_millis(total_us: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total_us as f64 / count as f64 / 1_000.0
    }
}
