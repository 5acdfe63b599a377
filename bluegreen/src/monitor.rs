//! Periodic status reporting for a running workload.
//!
//! The monitor only ever reads aggregator snapshots; current-window
//! throughput comes from its own previous-total bookkeeping.

use bluegreen_core::{Aggregator, MONITOR_INTERVAL};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub(crate) struct MonitorSettings {
    pub reads_expected: bool,
    pub writes_expected: bool,
    pub continuous: bool,
}

pub(crate) async fn run_monitor(
    stats: Arc<Aggregator>,
    settings: MonitorSettings,
    barrier: Arc<Barrier>,
    stop: CancellationToken,
) {
    barrier.wait().await;
    let started = Instant::now();
    let mut window_started = Instant::now();
    let mut window_reads = 0u64;
    let mut window_writes = 0u64;

    if settings.continuous {
        info!("monitor started (continuous mode)");
    } else {
        info!("monitor started");
    }

    loop {
        tokio::select! {
            _ = tokio::time::sleep(MONITOR_INTERVAL) => {}
            _ = stop.cancelled() => break,
        }

        let snapshot = stats.snapshot();
        let now = Instant::now();
        let window = now.duration_since(window_started).as_secs_f64();
        let running = humantime::format_duration(Duration::from_secs(started.elapsed().as_secs()));

        if settings.reads_expected {
            let rate = (snapshot.total_reads - window_reads) as f64 / window;
            info!(
                "status: running {running}, reads {}/{} ok ({:.2}%), current rate {rate:.1}/sec",
                snapshot.successful_reads, snapshot.total_reads, snapshot.read_success_rate,
            );
        } else {
            info!("status: running {running}");
        }
        if settings.writes_expected {
            let rate = (snapshot.total_writes - window_writes) as f64 / window;
            info!(
                "status: writes {}/{} ok ({:.2}%), {} read-only rejections, current rate {rate:.1}/sec",
                snapshot.successful_writes,
                snapshot.total_writes,
                snapshot.write_success_rate,
                snapshot.read_only_rejections,
            );
        }
        info!(
            "status: failovers {}, last endpoint {}",
            snapshot.failover_signals, snapshot.last_endpoint,
        );

        window_started = now;
        window_reads = snapshot.total_reads;
        window_writes = snapshot.total_writes;
    }

    info!("monitor stopped");
}
