//! Fatal error taxonomy for the simulation kernel.
//!
//! These are caller or data contract violations. Soft problems (unknown
//! consumables, inventory shortfalls) travel as warning strings on the
//! result types instead, and "nothing happened" outcomes are enum values.

use super::balance::{MonsterType, World};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("missing stage row for difficulty_index={0}")]
    MissingStage(u32),

    #[error("missing stat growth row: {0}")]
    MissingStatGrowth(String),

    #[error("combat constant `{key}` is not numeric: {value:?}")]
    NonNumericConstant { key: String, value: String },

    #[error("no monster rows for world={0}")]
    NoMonsterCandidates(World),

    #[error("unable to select {needed} combat skills from the skill table")]
    SkillSelection { needed: usize },

    #[error("unable to find fallback monster for type={0}")]
    MissingFallbackMonster(MonsterType),

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

pub type SimResult<T> = Result<T, SimError>;
