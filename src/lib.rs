//! Cultivation - simulation kernel of an incremental cultivation game
//!
//! Given balance tables and a save snapshot, resolves combat duels and
//! breakthrough/tribulation attempts and advances the save through
//! simulated time. Every entry point is a pure function of its inputs and
//! seed.

pub mod build_info;
pub mod character;
pub mod combat;
pub mod core;
pub mod progression;
pub mod simulator;

pub use crate::character::save::SaveV2;
pub use crate::core::balance::{BalanceIndexes, BalanceTables};
pub use crate::core::error::{SimError, SimResult};
