// src/lib.rs
pub mod aggregator;
pub mod chain;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod resolver;
pub mod scheduler;
pub mod session;
pub mod sources;
pub mod task;
pub mod tracker;
pub mod types;
pub mod utils;

#[cfg(test)]
mod testing;

pub use cli::Args;
pub use engine::{ReconEngine, RunContext};
pub use types::{Config, HostResult, ReconError, RunStats, Target};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
