//! Duel engine, combat types and the multi-duel report.

#![allow(unused_imports)]

pub mod logic;
pub mod report;
pub mod types;

pub use logic::*;
pub use report::*;
pub use types::*;
