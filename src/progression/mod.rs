//! Breakthrough and tribulation resolution, and applying attempts to saves.

#![allow(unused_imports)]

pub mod breakthrough;
pub mod tribulation;

pub use breakthrough::*;
pub use tribulation::*;
