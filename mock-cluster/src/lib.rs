//! An in-process simulated blue/green database pair.
//!
//! Connections are pinned to the endpoint generation that was active when
//! they were opened; a switchover (or an explicit sever) bumps the generation
//! and every held connection starts failing with a lost-connection error, the
//! way a real endpoint migration looks from the client side. Faults are
//! scriptable per test: read-only windows, refused connects, operation
//! latency, and per-connection operation caps that park the caller in
//! never-resolving I/O to exercise forced cancellation.

use async_trait::async_trait;
use bluegreen::connection::{
    BoxedConnection, ConnectError, Connection, ConnectionSource, MetadataSummary, OpError,
    WriteRecord,
};
use bluegreen_core::DbFailure;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Blue,
    Green,
}

impl Color {
    fn host(self) -> &'static str {
        match self {
            Color::Blue => "db-blue",
            Color::Green => "db-green",
        }
    }
}

struct ClusterState {
    active: Color,
    generation: u64,
    read_only: bool,
    refuse_connects: bool,
    op_delay: Duration,
    /// Connections park forever once they have served this many operations.
    ops_per_connection: Option<u64>,
    tables: HashSet<String>,
    reads: u64,
    writes: u64,
}

impl ClusterState {
    fn descriptor(&self) -> String {
        let role = if self.read_only { "READER" } else { "WRITER" };
        format!("{}:3306 [{role}]", self.active.host())
    }
}

/// Scriptable fake of a blue/green database pair.
#[derive(Clone)]
pub struct MockCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl Default for MockCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCluster {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ClusterState {
                active: Color::Blue,
                generation: 0,
                read_only: false,
                refuse_connects: false,
                op_delay: Duration::ZERO,
                ops_per_connection: None,
                tables: HashSet::new(),
                reads: 0,
                writes: 0,
            })),
        }
    }

    /// Migrate the active endpoint to green, severing every held connection.
    pub fn switch_to_green(&self) {
        let mut state = self.state.lock().unwrap();
        state.active = Color::Green;
        state.generation += 1;
        debug!("mock cluster switched to {}", state.descriptor());
    }

    /// Sever held connections without moving the endpoint.
    pub fn sever_connections(&self) {
        self.state.lock().unwrap().generation += 1;
    }

    /// Put the active endpoint into (or out of) a read-only role.
    pub fn set_read_only(&self, read_only: bool) {
        self.state.lock().unwrap().read_only = read_only;
    }

    pub fn refuse_new_connections(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_connects = refuse;
    }

    /// Add fixed latency to every operation.
    pub fn set_op_delay(&self, delay: Duration) {
        self.state.lock().unwrap().op_delay = delay;
    }

    /// Make every connection serve exactly `ops` operations and then block
    /// forever, as if stuck in I/O.
    pub fn park_after_ops(&self, ops: u64) {
        self.state.lock().unwrap().ops_per_connection = Some(ops);
    }

    pub fn active_endpoint(&self) -> String {
        self.state.lock().unwrap().descriptor()
    }

    pub fn read_count(&self) -> u64 {
        self.state.lock().unwrap().reads
    }

    pub fn write_count(&self) -> u64 {
        self.state.lock().unwrap().writes
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.state.lock().unwrap().tables.contains(name)
    }

    pub fn tables(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut tables: Vec<_> = state.tables.iter().cloned().collect();
        tables.sort();
        tables
    }
}

#[async_trait]
impl ConnectionSource for MockCluster {
    async fn connect(&self) -> Result<BoxedConnection, ConnectError> {
        let state = self.state.lock().unwrap();
        if state.refuse_connects {
            return Err(ConnectError(DbFailure::new(
                "connection refused by simulated cluster",
            )));
        }
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
            generation: state.generation,
            ops: 0,
        }))
    }
}

struct MockConnection {
    state: Arc<Mutex<ClusterState>>,
    generation: u64,
    ops: u64,
}

enum Gate {
    Proceed(Duration),
    Park,
}

impl MockConnection {
    /// Common entry for every operation: severed connections fail, capped
    /// connections park. Never holds the lock across an await.
    fn gate(&self) -> Result<Gate, OpError> {
        let state = self.state.lock().unwrap();
        if state.generation != self.generation {
            return Err(OpError::ConnectionLost(DbFailure::new(
                "Communications link failure: endpoint migrated away",
            )));
        }
        if state
            .ops_per_connection
            .is_some_and(|limit| self.ops >= limit)
        {
            return Ok(Gate::Park);
        }
        Ok(Gate::Proceed(state.op_delay))
    }

    async fn pass_gate(&self) -> Result<(), OpError> {
        match self.gate()? {
            Gate::Proceed(delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(())
            }
            Gate::Park => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn endpoint(&mut self) -> String {
        self.state.lock().unwrap().descriptor()
    }

    async fn read_metadata(&mut self) -> Result<MetadataSummary, OpError> {
        self.pass_gate().await?;
        self.ops += 1;
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        Ok(MetadataSummary {
            endpoint: state.descriptor(),
            server_version: "8.0-simulated".to_string(),
            read_only: state.read_only,
            table_count: state.tables.len(),
        })
    }

    async fn ensure_table(&mut self, table: &str) -> Result<(), OpError> {
        self.pass_gate().await?;
        self.state.lock().unwrap().tables.insert(table.to_string());
        Ok(())
    }

    async fn insert(&mut self, table: &str, _record: &WriteRecord) -> Result<(), OpError> {
        self.pass_gate().await?;
        self.ops += 1;
        let mut state = self.state.lock().unwrap();
        if state.read_only {
            return Err(OpError::Operation(DbFailure::with_code(
                "The MySQL server is running with the --read-only option so it cannot \
                 execute this statement",
                1290,
            )));
        }
        if !state.tables.contains(table) {
            return Err(OpError::Operation(DbFailure::with_code(
                format!("Table '{table}' doesn't exist"),
                1146,
            )));
        }
        state.writes += 1;
        Ok(())
    }
}
