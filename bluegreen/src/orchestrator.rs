//! Top-level lifecycle management for workload runs.

use crate::connection::ConnectionSource;
use crate::error::StartError;
use crate::monitor::{run_monitor, MonitorSettings};
use crate::worker::{run_persistent_write_worker, run_read_worker, run_write_worker};
use bluegreen_core::{
    Aggregator, RunConfig, StatsSnapshot, WriteOnlyConfig, SHUTDOWN_GRACE_PERIOD,
};
use futures::future::join_all;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Barrier, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// Identifier for one run, derived from its start timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    fn workload(start_ms: u128) -> Self {
        Self(format!("BG-{start_ms}"))
    }

    fn write_only(start_ms: u128) -> Self {
        Self(format!("WRITE-{start_ms}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a successful `start` hands back.
#[derive(Clone, Debug, Serialize)]
pub struct StartReceipt {
    pub run_id: RunId,
    pub continuous: bool,
}

/// Full snapshot returned by [`Orchestrator::status`].
#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    pub running: bool,
    pub continuous: bool,
    pub writes_enabled: bool,
    /// Seconds the current run has been going; for an idle orchestrator, the
    /// final elapsed time of the last completed run (zero if none).
    pub elapsed_secs: u64,
    pub stats: StatsSnapshot,
}

struct ActiveRun {
    id: RunId,
    stop: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    started: Instant,
}

/// The top-level lifecycle manager: owns the single-run gate, the statistics
/// aggregator, and the cooperative stop token every worker polls.
///
/// Exactly one run may be in progress process-wide; the gate is a single
/// atomic check-and-set so two near-simultaneous `start` calls cannot both
/// succeed. Cloning is cheap and every clone drives the same state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn ConnectionSource>,
    stats: Arc<Aggregator>,
    grace_period: Duration,
    running: AtomicBool,
    continuous: AtomicBool,
    writes_enabled: AtomicBool,
    last_elapsed_secs: AtomicU64,
    active: Mutex<Option<ActiveRun>>,
}

impl Orchestrator {
    pub fn new(source: Arc<dyn ConnectionSource>) -> Self {
        Self::with_grace_period(source, SHUTDOWN_GRACE_PERIOD)
    }

    /// Like [`Orchestrator::new`] with a custom shutdown grace period (how
    /// long `stop` waits before hard-cancelling workers stuck in I/O).
    pub fn with_grace_period(source: Arc<dyn ConnectionSource>, grace_period: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                stats: Arc::new(Aggregator::new()),
                grace_period,
                running: AtomicBool::new(false),
                continuous: AtomicBool::new(false),
                writes_enabled: AtomicBool::new(false),
                last_elapsed_secs: AtomicU64::new(0),
                active: Mutex::new(None),
            }),
        }
    }

    /// Start a read/write workload run.
    ///
    /// Fails with [`StartError::InvalidConfig`] or
    /// [`StartError::AlreadyRunning`] before any side effect; statistics are
    /// only reset once the run slot is held.
    pub async fn start(&self, config: RunConfig) -> Result<StartReceipt, StartError> {
        config.validate()?;
        self.acquire_run_slot()?;

        let inner = &self.inner;
        let continuous = config.is_continuous();
        let start_ms = epoch_millis();
        let id = RunId::workload(start_ms);
        let table = write_table_name(start_ms);
        let stop = CancellationToken::new();

        inner.stats.reset();
        inner.continuous.store(continuous, Ordering::Relaxed);
        inner
            .writes_enabled
            .store(config.writes_enabled, Ordering::Relaxed);

        info!(
            "starting {id}: {} read workers at {}/sec each, {}, {}",
            config.worker_threads,
            config.reads_per_second,
            if config.writes_enabled {
                format!(
                    "{} write workers at {}/sec each",
                    config.worker_threads, config.writes_per_second
                )
            } else {
                "writes disabled".to_string()
            },
            if continuous {
                "continuous until stopped".to_string()
            } else {
                format!("for {}s", config.duration_secs)
            },
        );

        let worker_count = if config.writes_enabled {
            config.worker_threads as usize * 2
        } else {
            config.worker_threads as usize
        };
        // Everyone, monitor included, is released at once so workload onset
        // skew stays bounded by spawn time.
        let barrier = Arc::new(Barrier::new(worker_count + 1));

        let mut workers = Vec::with_capacity(worker_count + 1);
        for ordinal in 1..=config.worker_threads {
            workers.push(tokio::spawn(run_read_worker(
                ordinal,
                Arc::clone(&inner.source),
                config.clone(),
                Arc::clone(&inner.stats),
                Arc::clone(&barrier),
                stop.clone(),
            )));
        }
        if config.writes_enabled {
            for ordinal in 1..=config.worker_threads {
                workers.push(tokio::spawn(run_write_worker(
                    ordinal,
                    Arc::clone(&inner.source),
                    config.clone(),
                    table.clone(),
                    Arc::clone(&inner.stats),
                    Arc::clone(&barrier),
                    stop.clone(),
                )));
            }
        }
        workers.push(tokio::spawn(run_monitor(
            Arc::clone(&inner.stats),
            MonitorSettings {
                reads_expected: true,
                writes_expected: config.writes_enabled,
                continuous,
            },
            Arc::clone(&barrier),
            stop.clone(),
        )));

        *inner.active.lock().await = Some(ActiveRun {
            id: id.clone(),
            stop: stop.clone(),
            workers,
            started: Instant::now(),
        });

        if let Some(duration) = config.duration() {
            let orchestrator = self.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {
                        orchestrator.finish("run duration elapsed").await;
                    }
                    // A manual stop got there first.
                    _ = stop.cancelled() => {}
                }
            });
        }

        Ok(StartReceipt {
            run_id: id,
            continuous,
        })
    }

    /// Start the write-only variant: `connections` workers, each holding one
    /// connection for the whole run, writing on a fixed interval. Continuous
    /// by definition; subject to the same single-run gate as `start`.
    pub async fn start_write_only(
        &self,
        config: WriteOnlyConfig,
    ) -> Result<StartReceipt, StartError> {
        config.validate()?;
        self.acquire_run_slot()?;

        let inner = &self.inner;
        let start_ms = epoch_millis();
        let id = RunId::write_only(start_ms);
        let table = write_table_name(start_ms);
        let stop = CancellationToken::new();

        inner.stats.reset();
        inner.continuous.store(true, Ordering::Relaxed);
        inner.writes_enabled.store(true, Ordering::Relaxed);

        info!(
            "starting {id}: {} persistent write workers, interval {}ms",
            config.connections, config.write_interval_ms
        );

        let barrier = Arc::new(Barrier::new(config.connections as usize + 1));
        let mut workers = Vec::with_capacity(config.connections as usize + 1);
        for ordinal in 1..=config.connections {
            workers.push(tokio::spawn(run_persistent_write_worker(
                ordinal,
                Arc::clone(&inner.source),
                config.interval(),
                table.clone(),
                Arc::clone(&inner.stats),
                Arc::clone(&barrier),
                stop.clone(),
            )));
        }
        workers.push(tokio::spawn(run_monitor(
            Arc::clone(&inner.stats),
            MonitorSettings {
                reads_expected: false,
                writes_expected: true,
                continuous: true,
            },
            Arc::clone(&barrier),
            stop.clone(),
        )));

        *inner.active.lock().await = Some(ActiveRun {
            id: id.clone(),
            stop,
            workers,
            started: Instant::now(),
        });

        Ok(StartReceipt {
            run_id: id,
            continuous: true,
        })
    }

    /// Stop the current run if one is in progress. Safe to call when idle.
    pub async fn stop(&self) {
        self.finish("stop requested").await;
    }

    /// Current state plus every statistics field and its derived figures.
    pub async fn status(&self) -> StatusReport {
        let inner = &self.inner;
        let running = inner.running.load(Ordering::SeqCst);
        let elapsed_secs = if running {
            inner
                .active
                .lock()
                .await
                .as_ref()
                .map(|run| run.started.elapsed().as_secs())
                .unwrap_or(0)
        } else {
            inner.last_elapsed_secs.load(Ordering::Relaxed)
        };

        StatusReport {
            running,
            continuous: inner.continuous.load(Ordering::Relaxed),
            writes_enabled: inner.writes_enabled.load(Ordering::Relaxed),
            elapsed_secs,
            stats: inner.stats.snapshot(),
        }
    }

    fn acquire_run_slot(&self) -> Result<(), StartError> {
        self.inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| StartError::AlreadyRunning)
    }

    async fn finish(&self, reason: &str) {
        let inner = &self.inner;
        let Some(run) = inner.active.lock().await.take() else {
            debug!("stop requested while idle");
            return;
        };

        info!("stopping {}: {reason}", run.id);
        run.stop.cancel();

        let abort_handles: Vec<_> = run.workers.iter().map(|w| w.abort_handle()).collect();
        if tokio::time::timeout(inner.grace_period, join_all(run.workers))
            .await
            .is_err()
        {
            // Workers still blocked in I/O; best-effort shutdown proceeds.
            warn!(
                "shutdown grace period ({:?}) elapsed, aborting remaining workers",
                inner.grace_period
            );
            for handle in abort_handles {
                handle.abort();
            }
        }

        let elapsed = run.started.elapsed();
        inner
            .last_elapsed_secs
            .store(elapsed.as_secs(), Ordering::Relaxed);
        inner.running.store(false, Ordering::SeqCst);

        self.final_report(&run.id, elapsed);
    }

    fn final_report(&self, id: &RunId, elapsed: Duration) {
        let snapshot = self.inner.stats.snapshot();
        let elapsed_secs = elapsed.as_secs_f64().max(f64::EPSILON);

        info!("final report for {id} ({:.1}s)", elapsed.as_secs_f64());
        info!(
            "  reads: {} total, {} ok, {} failed ({:.2}% success, mean latency {:.1}ms, {:.1}/sec overall)",
            snapshot.total_reads,
            snapshot.successful_reads,
            snapshot.failed_reads,
            snapshot.read_success_rate,
            snapshot.mean_read_latency_ms,
            snapshot.total_reads as f64 / elapsed_secs,
        );
        if self.inner.writes_enabled.load(Ordering::Relaxed) {
            info!(
                "  writes: {} total, {} ok, {} failed ({:.2}% success, mean latency {:.1}ms), {} read-only rejections",
                snapshot.total_writes,
                snapshot.successful_writes,
                snapshot.failed_writes,
                snapshot.write_success_rate,
                snapshot.mean_write_latency_ms,
                snapshot.read_only_rejections,
            );
        }
        if snapshot.failover_signals > 0 {
            info!(
                "  failovers detected: {} (last endpoint {})",
                snapshot.failover_signals, snapshot.last_endpoint
            );
        } else {
            warn!("  no failover detected; the switchover may not have occurred during this run");
        }
    }
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

fn write_table_name(start_ms: u128) -> String {
    format!("bg_run_{start_ms}")
}
