//! Balance data, shared math, and the save progression loop.

#![allow(unused_imports)]

pub mod balance;
pub mod combat_math;
pub mod constants;
pub mod cultivation;
pub mod error;
pub mod offline;
pub mod rng;
pub mod sample;
pub mod tick;

pub use balance::*;
pub use combat_math::*;
pub use constants::*;
pub use cultivation::*;
pub use error::*;
pub use offline::*;
pub use rng::*;
pub use sample::*;
pub use tick::*;
