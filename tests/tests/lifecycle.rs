mod utils;
use utils::init;

use bluegreen::prelude::*;
use bluegreen::{Orchestrator, StartError};
use mock_cluster::MockCluster;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A short grace period keeps forced-cancellation tests quick.
const TEST_GRACE: Duration = Duration::from_millis(300);

fn orchestrator_over(cluster: &MockCluster) -> Orchestrator {
    Orchestrator::with_grace_period(Arc::new(cluster.clone()), TEST_GRACE)
}

fn reads_only(worker_threads: u32, reads_per_second: u32, duration_secs: u64) -> RunConfig {
    RunConfig {
        worker_threads,
        reads_per_second,
        writes_per_second: 0,
        duration_secs,
        writes_enabled: false,
    }
}

async fn wait_until_idle(orchestrator: &Orchestrator, within: Duration) {
    let deadline = Instant::now() + within;
    loop {
        if !orchestrator.status().await.running {
            return;
        }
        assert!(Instant::now() < deadline, "run did not reach idle in time");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn second_start_is_rejected_without_resetting_statistics() {
    init();
    let cluster = MockCluster::new();
    let orchestrator = orchestrator_over(&cluster);

    orchestrator.start(reads_only(2, 200, 0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let before = orchestrator.status().await.stats;
    assert!(before.total_reads > 0);

    let err = orchestrator.start(reads_only(2, 200, 0)).await.unwrap_err();
    assert!(matches!(err, StartError::AlreadyRunning));

    // The rejected start must not have reset the counters of the live run.
    let after = orchestrator.status().await.stats;
    assert!(after.total_reads >= before.total_reads);

    orchestrator.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn timed_run_completes_on_its_own_and_reports_elapsed() {
    init();
    let cluster = MockCluster::new();
    let orchestrator = orchestrator_over(&cluster);

    let receipt = orchestrator
        .start(RunConfig {
            worker_threads: 2,
            reads_per_second: 100,
            writes_per_second: 20,
            duration_secs: 1,
            writes_enabled: true,
        })
        .await
        .unwrap();
    assert!(!receipt.continuous);
    assert!(receipt.run_id.as_str().starts_with("BG-"));

    wait_until_idle(&orchestrator, Duration::from_secs(5)).await;

    let status = orchestrator.status().await;
    assert!(!status.running);
    assert!((1..=2).contains(&status.elapsed_secs));
    assert!(status.stats.total_reads > 0);
    assert!(status.stats.total_writes > 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn continuous_run_only_stops_on_request() {
    init();
    let cluster = MockCluster::new();
    let orchestrator = orchestrator_over(&cluster);

    let receipt = orchestrator.start(reads_only(2, 200, 0)).await.unwrap();
    assert!(receipt.continuous);

    // No duration: the run must still be going well past any op count.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let status = orchestrator.status().await;
    assert!(status.running);
    assert!(status.continuous);

    orchestrator.stop().await;
    assert!(!orchestrator.status().await.running);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_is_idempotent_and_preserves_final_statistics() {
    init();
    let cluster = MockCluster::new();
    let orchestrator = orchestrator_over(&cluster);

    // Stopping a never-started orchestrator is a successful no-op.
    orchestrator.stop().await;
    assert!(!orchestrator.status().await.running);

    orchestrator.start(reads_only(2, 500, 0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    orchestrator.stop().await;

    let first = orchestrator.status().await;
    assert!(!first.running);
    assert!(first.stats.total_reads > 0);

    orchestrator.stop().await;
    let second = orchestrator.status().await;
    assert_eq!(second.stats.total_reads, first.stats.total_reads);
    assert_eq!(second.stats.successful_reads, first.stats.successful_reads);
    assert_eq!(second.elapsed_secs, first.elapsed_secs);
}

#[tokio::test(flavor = "multi_thread")]
async fn stuck_workers_are_force_cancelled_after_the_grace_period() {
    init();
    let cluster = MockCluster::new();
    // Two ops per connection, then the fake database hangs in I/O forever.
    cluster.park_after_ops(2);
    let orchestrator = orchestrator_over(&cluster);

    orchestrator.start(reads_only(2, 1_000, 0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stopping = Instant::now();
    orchestrator.stop().await;
    let took = stopping.elapsed();

    // The cooperative path cannot finish (workers are parked), so stop must
    // take the whole grace period and then abort.
    assert!(took >= TEST_GRACE);
    assert!(took < TEST_GRACE + Duration::from_secs(2));

    let status = orchestrator.status().await;
    assert!(!status.running);
    assert_eq!(status.stats.total_reads, 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_slot_is_shared_with_the_write_only_variant() {
    init();
    let cluster = MockCluster::new();
    let orchestrator = orchestrator_over(&cluster);

    orchestrator.start(reads_only(1, 100, 0)).await.unwrap();
    let err = orchestrator
        .start_write_only(WriteOnlyConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StartError::AlreadyRunning));

    orchestrator.stop().await;
}
