use crate::constants::{
    MAX_DURATION_SECS, MAX_READS_PER_SECOND, MAX_WORKER_THREADS, MAX_WRITES_PER_SECOND,
    MAX_WRITE_INTERVAL_MS,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

/// Immutable configuration for one workload run.
///
/// Rates are per worker; the aggregate read rate is
/// `worker_threads * reads_per_second`. A `duration_secs` of zero selects
/// continuous mode, which only ends on an explicit stop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub worker_threads: u32,
    pub reads_per_second: u32,
    pub writes_per_second: u32,
    pub duration_secs: u64,
    pub writes_enabled: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            worker_threads: 20,
            reads_per_second: 500,
            writes_per_second: 10,
            duration_secs: 3600,
            writes_enabled: true,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if !(1..=MAX_WORKER_THREADS).contains(&self.worker_threads) {
            return Err(InvalidConfig::WorkerThreads(self.worker_threads));
        }
        if !(1..=MAX_READS_PER_SECOND).contains(&self.reads_per_second) {
            return Err(InvalidConfig::ReadsPerSecond(self.reads_per_second));
        }
        if self.writes_per_second > MAX_WRITES_PER_SECOND
            || (self.writes_enabled && self.writes_per_second == 0)
        {
            return Err(InvalidConfig::WritesPerSecond(self.writes_per_second));
        }
        if self.duration_secs > MAX_DURATION_SECS {
            return Err(InvalidConfig::DurationSecs(self.duration_secs));
        }
        Ok(())
    }

    pub fn is_continuous(&self) -> bool {
        self.duration_secs == 0
    }

    /// `None` in continuous mode.
    pub fn duration(&self) -> Option<Duration> {
        (!self.is_continuous()).then(|| Duration::from_secs(self.duration_secs))
    }

    pub fn read_quota(&self) -> NonZeroU32 {
        NonZeroU32::new(self.reads_per_second).unwrap_or(NonZeroU32::MIN)
    }

    pub fn write_quota(&self) -> NonZeroU32 {
        NonZeroU32::new(self.writes_per_second).unwrap_or(NonZeroU32::MIN)
    }
}

/// Configuration for the write-only variant: each worker holds a single
/// connection for the whole run and writes on a fixed interval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOnlyConfig {
    pub connections: u32,
    pub write_interval_ms: u64,
}

impl Default for WriteOnlyConfig {
    fn default() -> Self {
        Self {
            connections: 10,
            write_interval_ms: 100,
        }
    }
}

impl WriteOnlyConfig {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if !(1..=MAX_WORKER_THREADS).contains(&self.connections) {
            return Err(InvalidConfig::Connections(self.connections));
        }
        if self.write_interval_ms > MAX_WRITE_INTERVAL_MS {
            return Err(InvalidConfig::WriteIntervalMs(self.write_interval_ms));
        }
        Ok(())
    }

    /// `None` means unthrottled (write as fast as possible).
    pub fn interval(&self) -> Option<Duration> {
        (self.write_interval_ms > 0).then(|| Duration::from_millis(self.write_interval_ms))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvalidConfig {
    #[error("worker_threads must be between 1 and 100, got {0}")]
    WorkerThreads(u32),

    #[error("reads_per_second must be between 1 and 10000, got {0}")]
    ReadsPerSecond(u32),

    #[error("writes_per_second must be between 1 and 10000 when writes are enabled, got {0}")]
    WritesPerSecond(u32),

    #[error("duration_secs must be between 0 (continuous) and 86400, got {0}")]
    DurationSecs(u64),

    #[error("connections must be between 1 and 100, got {0}")]
    Connections(u32),

    #[error("write_interval_ms must be between 0 and 10000, got {0}")]
    WriteIntervalMs(u64),
}
