//! Worker loops driving individual connections at a target rate.
//!
//! Each worker owns exactly one connection for its whole lifetime. The only
//! state shared with the rest of the system is the statistics aggregator and
//! the cooperative stop token; both are checked at every loop iteration and
//! at the rate-limiting suspension point so stop requests are observed
//! promptly.

use crate::connection::{ConnectionSource, OpError, WriteRecord};
use bluegreen_core::{classify, Aggregator, RunConfig, PROGRESS_LOG_WINDOW};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Role {
    Read,
    Write,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Read => f.write_str("Read"),
            Role::Write => f.write_str("Write"),
        }
    }
}

/// Per-worker bookkeeping: identity, operation counter, and the rate window
/// used for this worker's own progress logging. Never shared across workers.
struct WorkerContext {
    role: Role,
    ordinal: u32,
    ops: u64,
    window_started: Instant,
    window_ops: u64,
}

impl WorkerContext {
    fn new(role: Role, ordinal: u32) -> Self {
        Self {
            role,
            ordinal,
            ops: 0,
            window_started: Instant::now(),
            window_ops: 0,
        }
    }

    /// Count one operation, logging the observed rate once per window.
    fn tick(&mut self) {
        self.ops += 1;
        self.window_ops += 1;
        let elapsed = self.window_started.elapsed();
        if elapsed >= PROGRESS_LOG_WINDOW {
            let rate = self.window_ops as f64 / elapsed.as_secs_f64();
            debug!(
                "{}-{}: {} ops, current rate {rate:.1}/sec",
                self.role, self.ordinal, self.ops
            );
            self.window_started = Instant::now();
            self.window_ops = 0;
        }
    }
}

pub(crate) async fn run_read_worker(
    ordinal: u32,
    source: Arc<dyn ConnectionSource>,
    config: RunConfig,
    stats: Arc<Aggregator>,
    barrier: Arc<Barrier>,
    stop: CancellationToken,
) {
    let limiter = rate_limiter(config.read_quota());
    barrier.wait().await;

    let mut conn = match source.connect().await {
        Ok(conn) => conn,
        Err(err) => {
            error!("Read-{ordinal}: {err}");
            return;
        }
    };
    let endpoint = conn.endpoint().await;
    stats.observe_endpoint(&endpoint);
    info!("Read-{ordinal}: connected to {endpoint}");

    let mut ctx = WorkerContext::new(Role::Read, ordinal);
    let deadline = config.duration().map(|duration| Instant::now() + duration);
    let started = Instant::now();

    while !stop.is_cancelled() && !past(deadline) {
        let op_started = Instant::now();
        let result = conn.read_metadata().await;
        let elapsed = op_started.elapsed();

        match result {
            Ok(meta) => {
                stats.record_read_success(elapsed);
                stats.observe_endpoint(&meta.endpoint);
            }
            Err(OpError::Operation(failure)) => {
                let kind = classify(&failure);
                stats.record_read_failure(elapsed, kind);
                debug!("Read-{ordinal}: metadata read failed ({kind:?}): {failure}");
            }
            Err(OpError::ConnectionLost(failure)) => {
                // The signal we are here to observe: do not reacquire.
                let kind = classify(&failure);
                stats.record_read_failure(elapsed, kind);
                warn!("Read-{ordinal}: connection lost, worker exiting: {failure}");
                break;
            }
        }

        ctx.tick();

        tokio::select! {
            _ = limiter.until_ready() => {}
            _ = stop.cancelled() => break,
        }
    }

    info!(
        "Read-{ordinal}: finished after {} reads in {:.1}s",
        ctx.ops,
        started.elapsed().as_secs_f64()
    );
}

pub(crate) async fn run_write_worker(
    ordinal: u32,
    source: Arc<dyn ConnectionSource>,
    config: RunConfig,
    table: String,
    stats: Arc<Aggregator>,
    barrier: Arc<Barrier>,
    stop: CancellationToken,
) {
    let gate = WriteGate::Rate(rate_limiter(config.write_quota()));
    let deadline = config.duration().map(|duration| Instant::now() + duration);
    write_loop(ordinal, source, gate, deadline, table, stats, barrier, stop).await;
}

/// Write-only variant: a fixed interval instead of a derived rate, no
/// deadline (the run is continuous by definition), and the same held
/// connection for the whole run.
pub(crate) async fn run_persistent_write_worker(
    ordinal: u32,
    source: Arc<dyn ConnectionSource>,
    interval: Option<Duration>,
    table: String,
    stats: Arc<Aggregator>,
    barrier: Arc<Barrier>,
    stop: CancellationToken,
) {
    let gate = WriteGate::Interval(interval);
    write_loop(ordinal, source, gate, None, table, stats, barrier, stop).await;
}

#[allow(clippy::too_many_arguments)]
async fn write_loop(
    ordinal: u32,
    source: Arc<dyn ConnectionSource>,
    gate: WriteGate,
    deadline: Option<Instant>,
    table: String,
    stats: Arc<Aggregator>,
    barrier: Arc<Barrier>,
    stop: CancellationToken,
) {
    barrier.wait().await;

    let mut conn = match source.connect().await {
        Ok(conn) => conn,
        Err(err) => {
            error!("Write-{ordinal}: {err}");
            return;
        }
    };
    let endpoint = conn.endpoint().await;
    stats.observe_endpoint(&endpoint);
    info!("Write-{ordinal}: connected to {endpoint}");

    match conn.ensure_table(&table).await {
        Ok(()) => debug!("Write-{ordinal}: table {table} ready"),
        Err(OpError::Operation(failure)) => {
            warn!("Write-{ordinal}: failed to ensure table {table}: {failure}");
        }
        Err(OpError::ConnectionLost(failure)) => {
            warn!("Write-{ordinal}: connection lost before first write: {failure}");
            return;
        }
    }

    let mut ctx = WorkerContext::new(Role::Write, ordinal);
    let started = Instant::now();

    while !stop.is_cancelled() && !past(deadline) {
        let record = WriteRecord {
            worker: format!("Write-{ordinal}"),
            endpoint: endpoint.clone(),
            payload: format!("Write-{ordinal} op #{}", ctx.ops),
        };

        let op_started = Instant::now();
        let result = conn.insert(&table, &record).await;
        let elapsed = op_started.elapsed();

        match result {
            Ok(()) => stats.record_write_success(elapsed),
            Err(OpError::Operation(failure)) => {
                let kind = classify(&failure);
                stats.record_write_failure(elapsed, kind);
                debug!("Write-{ordinal}: insert failed ({kind:?}): {failure}");
            }
            Err(OpError::ConnectionLost(failure)) => {
                let kind = classify(&failure);
                stats.record_write_failure(elapsed, kind);
                warn!("Write-{ordinal}: connection lost, worker exiting: {failure}");
                break;
            }
        }

        ctx.tick();

        if !gate.wait(&stop).await {
            break;
        }
    }

    info!(
        "Write-{ordinal}: finished after {} writes in {:.1}s",
        ctx.ops,
        started.elapsed().as_secs_f64()
    );
}

enum WriteGate {
    Rate(DefaultDirectRateLimiter),
    Interval(Option<Duration>),
}

impl WriteGate {
    /// Await the next permitted write. Returns `false` when a stop request
    /// arrived while waiting.
    async fn wait(&self, stop: &CancellationToken) -> bool {
        match self {
            WriteGate::Rate(limiter) => {
                tokio::select! {
                    _ = limiter.until_ready() => true,
                    _ = stop.cancelled() => false,
                }
            }
            WriteGate::Interval(Some(interval)) => {
                tokio::select! {
                    _ = tokio::time::sleep(*interval) => true,
                    _ = stop.cancelled() => false,
                }
            }
            // Interval of zero: write as fast as possible, relying on the
            // loop-head cancellation check.
            WriteGate::Interval(None) => true,
        }
    }
}

fn past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

fn rate_limiter(quota: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(quota).allow_burst(NonZeroU32::MIN))
}
