mod classify;
mod config;
mod constants;
mod stats;

pub use classify::*;
pub use config::*;
pub use constants::*;
pub use stats::*;
