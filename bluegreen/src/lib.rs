#![doc = include_str!("../README.md")]

pub mod connection;
pub mod mysql;
pub mod orchestrator;

pub(crate) mod monitor;
pub(crate) mod worker;

mod error;

pub use error::StartError;
pub use orchestrator::{Orchestrator, RunId, StartReceipt, StatusReport};

pub mod prelude {
    pub use crate::connection::{Connection, ConnectionSource};
    pub use crate::orchestrator::{Orchestrator, StatusReport};
    pub use crate::StartError;
    pub use bluegreen_core::{RunConfig, WriteOnlyConfig};
}
