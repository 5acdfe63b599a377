mod utils;
use utils::init;

use bluegreen::prelude::*;
use bluegreen::Orchestrator;
use mock_cluster::MockCluster;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn orchestrator_over(cluster: &MockCluster) -> Orchestrator {
    Orchestrator::with_grace_period(Arc::new(cluster.clone()), Duration::from_millis(300))
}

async fn wait_for(mut condition: impl FnMut() -> bool, within: Duration, what: &str) {
    let deadline = Instant::now() + within;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn capped_workers_complete_exactly_n_times_k_operations() {
    init();
    const WORKERS: u64 = 4;
    const OPS_PER_WORKER: u64 = 25;

    let cluster = MockCluster::new();
    cluster.park_after_ops(OPS_PER_WORKER);
    let orchestrator = orchestrator_over(&cluster);

    orchestrator
        .start(RunConfig {
            worker_threads: WORKERS as u32,
            reads_per_second: 1_000,
            writes_per_second: 0,
            duration_secs: 0,
            writes_enabled: false,
        })
        .await
        .unwrap();

    wait_for(
        || cluster.read_count() == WORKERS * OPS_PER_WORKER,
        Duration::from_secs(5),
        "all workers to hit their operation cap",
    )
    .await;
    orchestrator.stop().await;

    let stats = orchestrator.status().await.stats;
    assert_eq!(stats.total_reads, WORKERS * OPS_PER_WORKER);
    assert_eq!(stats.successful_reads, WORKERS * OPS_PER_WORKER);
    assert_eq!(stats.failed_reads, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn single_worker_rate_stays_within_the_tolerance_band() {
    init();
    const RATE: u64 = 20;

    let cluster = MockCluster::new();
    let orchestrator = orchestrator_over(&cluster);

    orchestrator
        .start(RunConfig {
            worker_threads: 1,
            reads_per_second: RATE as u32,
            writes_per_second: 0,
            duration_secs: 0,
            writes_enabled: false,
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    orchestrator.stop().await;

    // Scheduling jitter makes exact counts meaningless; a generous band
    // around RATE * 1s is the contract.
    let observed = orchestrator.status().await.stats.total_reads;
    assert!(
        (RATE / 2..=RATE * 2).contains(&observed),
        "observed {observed} ops for a {RATE}/sec worker over ~1s"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn write_only_run_creates_the_per_run_table_and_writes_unthrottled() {
    init();
    let cluster = MockCluster::new();
    let orchestrator = orchestrator_over(&cluster);

    let receipt = orchestrator
        .start_write_only(WriteOnlyConfig {
            connections: 3,
            write_interval_ms: 0,
        })
        .await
        .unwrap();
    assert!(receipt.continuous);
    assert!(receipt.run_id.as_str().starts_with("WRITE-"));

    wait_for(
        || cluster.write_count() > 300,
        Duration::from_secs(5),
        "unthrottled writers to accumulate",
    )
    .await;

    let status = orchestrator.status().await;
    assert!(status.running);
    assert!(status.continuous);
    assert!(status.writes_enabled);
    assert_eq!(status.stats.total_reads, 0);

    orchestrator.stop().await;

    // One shared per-run table, ensured idempotently by all three workers.
    let tables = cluster.tables();
    assert_eq!(tables.len(), 1);
    assert!(tables[0].starts_with("bg_run_"));
}

#[tokio::test(flavor = "multi_thread")]
async fn write_only_interval_throttles_the_cadence() {
    init();
    let cluster = MockCluster::new();
    let orchestrator = orchestrator_over(&cluster);

    orchestrator
        .start_write_only(WriteOnlyConfig {
            connections: 2,
            write_interval_ms: 50,
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    orchestrator.stop().await;

    // Two workers at ~20/sec each over ~0.5s.
    let written = orchestrator.status().await.stats.total_writes;
    assert!(
        (4..=60).contains(&written),
        "observed {written} writes for 2 workers at 50ms interval over ~0.5s"
    );
}
