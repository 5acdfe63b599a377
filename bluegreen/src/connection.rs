//! The seam between the workload engine and an actual database.
//!
//! Workers only ever talk to these traits; the MySQL implementation lives in
//! [`crate::mysql`] and the test suites substitute an in-process fake.

use async_trait::async_trait;
use bluegreen_core::DbFailure;
use thiserror::Error;

/// Summary of one metadata read: a descriptive look at the serving node and
/// an enumeration of the relations visible to the connection.
#[derive(Clone, Debug)]
pub struct MetadataSummary {
    /// Descriptor of the physical node and role serving the connection.
    pub endpoint: String,
    pub server_version: String,
    pub read_only: bool,
    pub table_count: usize,
}

/// One row inserted by a write worker. The timestamp is assigned server-side.
#[derive(Clone, Debug)]
pub struct WriteRecord {
    pub worker: String,
    pub endpoint: String,
    pub payload: String,
}

/// Outcome of a single failed operation attempt.
///
/// An `Operation` failure is recorded and the worker keeps going; a
/// `ConnectionLost` failure means the connection is no longer usable and the
/// worker exits its loop without reacquiring. The two are distinct variants
/// so callers cannot conflate them.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("operation failed: {0}")]
    Operation(DbFailure),

    #[error("connection lost: {0}")]
    ConnectionLost(DbFailure),
}

impl OpError {
    pub fn failure(&self) -> &DbFailure {
        match self {
            OpError::Operation(failure) | OpError::ConnectionLost(failure) => failure,
        }
    }
}

/// Failure to hand out a connection at all.
#[derive(Debug, Error)]
#[error("failed to acquire connection: {0}")]
pub struct ConnectError(pub DbFailure);

pub type BoxedConnection = Box<dyn Connection>;

/// Hands out live database connections. Ownership of a returned connection
/// transfers to the caller until the connection is dropped.
#[async_trait]
pub trait ConnectionSource: Send + Sync + 'static {
    async fn connect(&self) -> Result<BoxedConnection, ConnectError>;
}

/// One exclusively-owned database connection.
#[async_trait]
pub trait Connection: Send {
    /// Descriptor of the endpoint serving this connection. Implementations
    /// fold lookup errors into an "unknown" descriptor rather than failing.
    async fn endpoint(&mut self) -> String;

    /// A lightweight metadata read representative of real traffic.
    async fn read_metadata(&mut self) -> Result<MetadataSummary, OpError>;

    /// Create the write target if absent. Idempotent.
    async fn ensure_table(&mut self, table: &str) -> Result<(), OpError>;

    /// Insert one record into the write target.
    async fn insert(&mut self, table: &str, record: &WriteRecord) -> Result<(), OpError>;
}
