//! Simulation configuration.

use crate::combat::report::CombatReportConfig;
use crate::core::rng::DEFAULT_SEED;
use crate::progression::tribulation::{BreakthroughAttemptInput, BreakthroughTrialInput};
use serde::{Deserialize, Serialize};

/// Configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimConfig {
    /// Number of runs; run `i` uses seed `seed + i`
    pub num_runs: u32,

    /// Base seed, overrides the seeds inside `combat` and `trials`
    pub seed: u32,

    /// Combat report template for every run
    pub combat: CombatReportConfig,

    /// Breakthrough trial template for every run
    pub trials: BreakthroughTrialInput,

    /// Log verbosity (0 = silent, 1 = summary, 2 = per run)
    pub verbosity: u8,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_runs: 20,
            seed: DEFAULT_SEED,
            combat: CombatReportConfig::quiet(),
            trials: BreakthroughTrialInput {
                attempt: BreakthroughAttemptInput {
                    difficulty_index: 5,
                    current_qi: 1_000_000,
                    ..Default::default()
                },
                trials: 500,
                seed: DEFAULT_SEED,
            },
            verbosity: 1,
        }
    }
}

impl SimConfig {
    /// Combat-heavy preset at one stage with a level picked for it.
    pub fn combat_balance(difficulty_index: u32, player_level: u32) -> Self {
        let defaults = Self::default();
        Self {
            num_runs: 100,
            combat: CombatReportConfig {
                difficulty_index,
                player_level,
                ..defaults.combat.clone()
            },
            trials: BreakthroughTrialInput {
                attempt: BreakthroughAttemptInput {
                    difficulty_index,
                    ..defaults.trials.attempt.clone()
                },
                trials: 50,
                ..defaults.trials.clone()
            },
            ..defaults
        }
    }

    /// Tribulation sweep: many trials per run at one stage.
    pub fn tribulation_sweep(difficulty_index: u32, trials: u32) -> Self {
        let mut config = Self::default();
        config.num_runs = 10;
        config.trials.attempt.difficulty_index = difficulty_index;
        config.trials.trials = trials;
        config
    }
}
