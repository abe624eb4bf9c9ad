//! Cultivator stats, rebirth upgrades and the save snapshot.

#![allow(unused_imports)]

pub mod derived_stats;
pub mod rebirth;
pub mod save;

pub use derived_stats::*;
pub use rebirth::*;
pub use save::*;
