//! Batch simulator for balance analysis.
//!
//! Runs many seeded combat reports and breakthrough trial sets against one
//! balance set and aggregates:
//! - duel win rate and pacing
//! - breakthrough outcome rates
//! - a digest that pins the exact outputs of the batch

mod config;
mod report;
mod runner;

pub use config::SimConfig;
pub use report::{RunStats, SimReport};
pub use runner::{run_simulation, run_single};
