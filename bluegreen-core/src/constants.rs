use std::time::Duration;

/// Upper bound on worker threads per role (and on connections in the
/// write-only variant).
pub const MAX_WORKER_THREADS: u32 = 100;

/// Upper bound on the per-worker read rate.
pub const MAX_READS_PER_SECOND: u32 = 10_000;

/// Upper bound on the per-worker write rate.
pub const MAX_WRITES_PER_SECOND: u32 = 10_000;

/// Upper bound on a timed run (24 hours). Zero means continuous.
pub const MAX_DURATION_SECS: u64 = 86_400;

/// Upper bound on the fixed write interval of the write-only variant.
pub const MAX_WRITE_INTERVAL_MS: u64 = 10_000;

/// How long `stop()` waits for workers to observe the cooperative stop
/// signal before falling back to hard cancellation.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Interval between monitor status reports.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Window for each worker's own progress logging.
pub const PROGRESS_LOG_WINDOW: Duration = Duration::from_secs(10);

/// Endpoint descriptor used before any connection has reported one.
pub const UNKNOWN_ENDPOINT: &str = "unknown";
