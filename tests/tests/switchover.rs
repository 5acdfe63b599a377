mod utils;
use utils::init;

use bluegreen::prelude::*;
use bluegreen::Orchestrator;
use mock_cluster::MockCluster;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn orchestrator_over(cluster: &MockCluster) -> Orchestrator {
    Orchestrator::with_grace_period(Arc::new(cluster.clone()), Duration::from_millis(300))
}

async fn wait_for<F, Fut>(mut condition: F, within: Duration, what: &str)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + within;
    while !condition().await {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn read_only_window_rejects_writes_while_the_run_continues() {
    init();
    let cluster = MockCluster::new();
    cluster.set_read_only(true);
    let orchestrator = orchestrator_over(&cluster);

    orchestrator
        .start(RunConfig {
            worker_threads: 2,
            reads_per_second: 200,
            writes_per_second: 100,
            duration_secs: 0,
            writes_enabled: true,
        })
        .await
        .unwrap();

    let orch = orchestrator.clone();
    wait_for(
        move || {
            let orch = orch.clone();
            async move { orch.status().await.stats.read_only_rejections > 5 }
        },
        Duration::from_secs(5),
        "read-only rejections to accumulate",
    )
    .await;

    let status = orchestrator.status().await;
    assert!(status.running, "per-operation failures must not end the run");
    assert_eq!(status.stats.successful_writes, 0);
    // Counters are updated independently, so compare with a tolerance for
    // the snapshot racing a concurrent increment.
    assert!(status.stats.read_only_rejections <= status.stats.failed_writes + 1);
    // Reads are unaffected by the read-only role.
    assert!(status.stats.successful_reads > 0);

    // Window over: the write path recovers on the same connections.
    cluster.set_read_only(false);
    let orch = orchestrator.clone();
    wait_for(
        move || {
            let orch = orch.clone();
            async move { orch.status().await.stats.successful_writes > 0 }
        },
        Duration::from_secs(5),
        "writes to recover",
    )
    .await;

    orchestrator.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn switchover_severs_workers_but_not_the_run() {
    init();
    const WORKERS: u64 = 3;

    let cluster = MockCluster::new();
    let orchestrator = orchestrator_over(&cluster);

    orchestrator
        .start(RunConfig {
            worker_threads: WORKERS as u32,
            reads_per_second: 500,
            writes_per_second: 0,
            duration_secs: 0,
            writes_enabled: false,
        })
        .await
        .unwrap();

    let warm_cluster = cluster.clone();
    wait_for(
        move || {
            let cluster = warm_cluster.clone();
            async move { cluster.read_count() > 10 }
        },
        Duration::from_secs(5),
        "the workload to warm up",
    )
    .await;

    cluster.switch_to_green();

    // Every held connection dies on its next operation; each worker records
    // one classified failover signal and exits without reacquiring.
    let orch = orchestrator.clone();
    wait_for(
        move || {
            let orch = orch.clone();
            async move { orch.status().await.stats.failover_signals >= WORKERS }
        },
        Duration::from_secs(5),
        "all workers to observe the severed connections",
    )
    .await;

    let status = orchestrator.status().await;
    assert!(status.running, "dead workers must not stop the run");
    assert_eq!(status.stats.failover_signals, WORKERS);
    assert_eq!(status.stats.failed_reads, WORKERS);
    // Workers never reconnect, so nobody observed the green endpoint.
    assert_eq!(status.stats.last_endpoint, "db-blue:3306 [WRITER]");

    // With every worker dead and no reacquisition, the read count is frozen.
    let reads_after_switch = cluster.read_count();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(cluster.read_count(), reads_after_switch);

    orchestrator.stop().await;
    assert!(!orchestrator.status().await.running);
}
