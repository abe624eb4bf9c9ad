//! Breakthrough / tribulation probability engine.
//!
//! Resolves one attempt at a stage from a seed and reports every additive
//! term that went into the odds. The engine never touches a save; see
//! [`super::breakthrough`] for applying a result.

use crate::character::rebirth::{resolve_rebirth_bonus, RebirthBranch, RebirthLevels};
use crate::core::balance::{BalanceIndexes, ItemType, World};
use crate::core::combat_math::{clamp, round_half_up};
use crate::core::constants::*;
use crate::core::error::{SimError, SimResult};
use crate::core::rng::{derive_seed, SeededRng, DEFAULT_SEED};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakthroughOutcome {
    BlockedNoQi,
    Success,
    MinorFail,
    RetreatFail,
    DeathFail,
}

impl BreakthroughOutcome {
    pub const ALL: [BreakthroughOutcome; 5] = [
        BreakthroughOutcome::BlockedNoQi,
        BreakthroughOutcome::Success,
        BreakthroughOutcome::MinorFail,
        BreakthroughOutcome::RetreatFail,
        BreakthroughOutcome::DeathFail,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BreakthroughOutcome::BlockedNoQi => "blocked_no_qi",
            BreakthroughOutcome::Success => "success",
            BreakthroughOutcome::MinorFail => "minor_fail",
            BreakthroughOutcome::RetreatFail => "retreat_fail",
            BreakthroughOutcome::DeathFail => "death_fail",
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            BreakthroughOutcome::MinorFail | BreakthroughOutcome::RetreatFail | BreakthroughOutcome::DeathFail
        )
    }
}

/// Tunable pity and minor-failure knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BreakthroughModifiers {
    pub fail_streak_bonus_per_stack_pct: f64,
    pub fail_streak_bonus_cap_pct: f64,
    pub minor_fail_qi_loss_ratio: f64,
    pub minor_fail_material_loss_pct: f64,
}

impl Default for BreakthroughModifiers {
    fn default() -> Self {
        Self {
            fail_streak_bonus_per_stack_pct: FAIL_STREAK_BONUS_PER_STACK_PCT,
            fail_streak_bonus_cap_pct: FAIL_STREAK_BONUS_CAP_PCT,
            minor_fail_qi_loss_ratio: MINOR_FAIL_QI_LOSS_RATIO,
            minor_fail_material_loss_pct: MINOR_FAIL_MATERIAL_LOSS_PCT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BreakthroughAttemptInput {
    pub difficulty_index: u32,
    pub current_qi: u64,
    pub fail_streak: u32,
    pub status_penalty_pct: f64,
    pub defensive_skill_guard_pct: f64,
    pub rebirth_levels: RebirthLevels,
    pub consumable_item_ids: Vec<String>,
    pub rng_seed: u32,
    pub modifiers: BreakthroughModifiers,
}

impl Default for BreakthroughAttemptInput {
    fn default() -> Self {
        Self {
            difficulty_index: 1,
            current_qi: 0,
            fail_streak: 0,
            status_penalty_pct: 0.0,
            defensive_skill_guard_pct: 0.0,
            rebirth_levels: RebirthLevels::default(),
            consumable_item_ids: Vec::new(),
            rng_seed: DEFAULT_SEED,
            modifiers: BreakthroughModifiers::default(),
        }
    }
}

/// One consumable that resolved to a numeric effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumableContribution {
    pub item_id: String,
    pub name: String,
    pub item_type: ItemType,
    pub effect_type: String,
    pub base_value: f64,
    pub applied_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessBreakdown {
    pub base_pct: f64,
    pub rebirth_bonus_pct: f64,
    pub consumable_bonus_pct: f64,
    pub fail_streak_bonus_pct: f64,
    pub status_penalty_pct: f64,
    pub final_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathBreakdown {
    pub base_pct: f64,
    pub rebirth_guard_pct: f64,
    pub consumable_guard_pct: f64,
    pub defensive_skill_guard_pct: f64,
    pub final_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    Table,
    Fallback,
}

/// How the non-success mass of a tribulation splits into outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureWeightProfile {
    pub source: WeightSource,
    pub minor_pct: f64,
    pub retreat_pct: f64,
    pub death_pct: f64,
    pub retreat_min_layers: u32,
    pub retreat_max_layers: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRates {
    pub success_pct: f64,
    pub death_pct: f64,
    pub failure_weights: Option<FailureWeightProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptBreakdown {
    pub success: SuccessBreakdown,
    pub death: Option<DeathBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumableUsage {
    pub used_item_ids: Vec<String>,
    pub contributions: Vec<ConsumableContribution>,
    pub ignored_item_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRolls {
    pub success_roll_pct: Option<f64>,
    pub failure_roll_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakthroughAttemptResult {
    pub outcome: BreakthroughOutcome,
    pub attempted: bool,
    pub is_tribulation: bool,
    pub difficulty_index: u32,
    pub next_difficulty_index: u32,
    pub world: World,
    pub stage_name: String,
    pub qi_required: u64,
    pub qi_delta: i64,
    pub material_loss_pct: f64,
    pub retreat_layers: u32,
    pub rates: AttemptRates,
    pub breakdown: AttemptBreakdown,
    pub consumables: ConsumableUsage,
    pub rolls: AttemptRolls,
    pub warnings: Vec<String>,
}

struct ConsumableEffects {
    breakthrough_bonus_pct: f64,
    tribulation_guard_pct: f64,
    usage: ConsumableUsage,
    warnings: Vec<String>,
}

fn collect_consumable_effects(
    indexes: &BalanceIndexes,
    item_ids: &[String],
    potion_mastery_mul: f64,
) -> ConsumableEffects {
    let mut effects = ConsumableEffects {
        breakthrough_bonus_pct: 0.0,
        tribulation_guard_pct: 0.0,
        usage: ConsumableUsage {
            used_item_ids: item_ids.to_vec(),
            ..ConsumableUsage::default()
        },
        warnings: Vec::new(),
    };

    for item_id in item_ids {
        let Some(row) = indexes.consumable(item_id) else {
            warn!(item_id = %item_id, "unknown consumable ignored");
            effects.usage.ignored_item_ids.push(item_id.clone());
            effects.warnings.push(format!("unknown consumable item_id: {}", item_id));
            continue;
        };

        let base_value = match row.effect_value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                warn!(item_id = %item_id, value = %row.effect_value, "non-numeric consumable ignored");
                effects.usage.ignored_item_ids.push(item_id.clone());
                effects
                    .warnings
                    .push(format!("invalid consumable effect_value: {}={}", item_id, row.effect_value));
                continue;
            }
        };

        let applied_value = match row.item_type {
            ItemType::Potion => base_value * (1.0 + potion_mastery_mul),
            ItemType::Talisman => base_value,
        };
        match row.effect_type.as_str() {
            EFFECT_BREAKTHROUGH_BONUS => effects.breakthrough_bonus_pct += applied_value,
            EFFECT_TRIBULATION_GUARD => effects.tribulation_guard_pct += applied_value,
            _ => {}
        }
        effects.usage.contributions.push(ConsumableContribution {
            item_id: item_id.clone(),
            name: row.name.clone(),
            item_type: row.item_type,
            effect_type: row.effect_type.clone(),
            base_value,
            applied_value,
        });
    }
    effects
}

/// `min = max(0, floor(min))`, `max = max(min, floor(max))`.
fn normalize_retreat_range(min: f64, max: f64) -> (u32, u32) {
    let lo = min.floor().max(0.0);
    let hi = max.floor().max(lo);
    (lo as u32, hi as u32)
}

/// Failure split for a tribulation stage whose death chance is already known.
pub fn failure_weight_profile(
    indexes: &BalanceIndexes,
    difficulty_index: u32,
    death_pct: f64,
    stage_retreat: (u32, u32),
) -> FailureWeightProfile {
    let Some(row) = indexes.failure_weights(difficulty_index) else {
        return FailureWeightProfile {
            source: WeightSource::Fallback,
            minor_pct: 100.0 - death_pct,
            retreat_pct: 0.0,
            death_pct,
            retreat_min_layers: stage_retreat.0,
            retreat_max_layers: stage_retreat.1,
        };
    };

    let non_death_weight = (row.weight_minor_fail + row.weight_retreat_fail).max(0.0);
    let non_death_pct = (100.0 - death_pct).max(0.0);
    let minor_pct = if non_death_weight > 0.0 {
        non_death_pct * row.weight_minor_fail / non_death_weight
    } else {
        non_death_pct
    };
    let retreat_pct = non_death_pct - minor_pct;
    let (lo, hi) = normalize_retreat_range(
        row.retreat_min_layers.unwrap_or(f64::from(stage_retreat.0)),
        row.retreat_max_layers.unwrap_or(f64::from(stage_retreat.1)),
    );

    FailureWeightProfile {
        source: WeightSource::Table,
        minor_pct: clamp(minor_pct, 0.0, 100.0),
        retreat_pct: clamp(retreat_pct, 0.0, 100.0),
        death_pct: clamp(death_pct, 0.0, 100.0),
        retreat_min_layers: lo,
        retreat_max_layers: hi,
    }
}

/// Uniform integer in `[min, max]`; consumes no roll when the range is a point.
fn sample_retreat_layers(rng: &mut SeededRng, min: u32, max: u32) -> u32 {
    if max <= min {
        return min;
    }
    let span = f64::from(max - min + 1);
    min + (rng.next_f64() * span).floor() as u32
}

/// Resolve exactly one breakthrough attempt.
///
/// # Errors
/// `MissingStage` when the difficulty index has no stage row.
pub fn evaluate_breakthrough_attempt(
    indexes: &BalanceIndexes,
    input: &BreakthroughAttemptInput,
) -> SimResult<BreakthroughAttemptResult> {
    let stage = indexes.stage(input.difficulty_index)?;
    let modifiers = input.modifiers;
    let status_penalty_pct = input.status_penalty_pct.max(0.0);
    let defensive_skill_guard_pct = input.defensive_skill_guard_pct.max(0.0);
    let mut rng = SeededRng::new(input.rng_seed);

    let levels = input.rebirth_levels;
    let rebirth_bonus_pct = resolve_rebirth_bonus(indexes, RebirthBranch::BreakthroughBonus, levels.breakthrough_bonus);
    let rebirth_guard_pct = resolve_rebirth_bonus(indexes, RebirthBranch::TribulationGuard, levels.tribulation_guard);
    let potion_mastery_mul = resolve_rebirth_bonus(indexes, RebirthBranch::PotionMastery, levels.potion_mastery);

    let effects = collect_consumable_effects(indexes, &input.consumable_item_ids, potion_mastery_mul);

    let fail_streak_bonus_pct = clamp(
        f64::from(input.fail_streak) * modifiers.fail_streak_bonus_per_stack_pct,
        0.0,
        modifiers.fail_streak_bonus_cap_pct.max(0.0),
    );
    let success_pct = clamp(
        stage.base_breakthrough_success_pct + rebirth_bonus_pct + effects.breakthrough_bonus_pct
            + fail_streak_bonus_pct
            - status_penalty_pct,
        SUCCESS_PCT_MIN,
        SUCCESS_PCT_MAX,
    );
    let success = SuccessBreakdown {
        base_pct: stage.base_breakthrough_success_pct,
        rebirth_bonus_pct,
        consumable_bonus_pct: effects.breakthrough_bonus_pct,
        fail_streak_bonus_pct,
        status_penalty_pct,
        final_pct: success_pct,
    };

    let stage_retreat = normalize_retreat_range(f64::from(stage.fail_retreat_min), f64::from(stage.fail_retreat_max));

    let (death, death_pct, failure_weights) = if stage.is_tribulation {
        let death_pct = clamp(
            stage.base_death_pct - rebirth_guard_pct - effects.tribulation_guard_pct - defensive_skill_guard_pct,
            0.0,
            DEATH_PCT_MAX,
        );
        let death = DeathBreakdown {
            base_pct: stage.base_death_pct,
            rebirth_guard_pct,
            consumable_guard_pct: effects.tribulation_guard_pct,
            defensive_skill_guard_pct,
            final_pct: death_pct,
        };
        let profile = failure_weight_profile(indexes, stage.difficulty_index, death_pct, stage_retreat);
        (Some(death), death_pct, Some(profile))
    } else {
        (None, 0.0, None)
    };

    let mut result = BreakthroughAttemptResult {
        outcome: BreakthroughOutcome::BlockedNoQi,
        attempted: false,
        is_tribulation: stage.is_tribulation,
        difficulty_index: stage.difficulty_index,
        next_difficulty_index: stage.difficulty_index,
        world: stage.world,
        stage_name: indexes.stage_row_display_name(stage),
        qi_required: stage.qi_required,
        qi_delta: 0,
        material_loss_pct: 0.0,
        retreat_layers: 0,
        rates: AttemptRates {
            success_pct,
            death_pct,
            failure_weights,
        },
        breakdown: AttemptBreakdown { success, death },
        consumables: effects.usage,
        rolls: AttemptRolls::default(),
        warnings: effects.warnings,
    };

    if input.current_qi < stage.qi_required {
        result.warnings.push(format!(
            "insufficient qi: current={}, required={}",
            input.current_qi, stage.qi_required
        ));
        return Ok(result);
    }

    result.attempted = true;
    let required = stage.qi_required as i64;
    let minor_loss = round_half_up(stage.qi_required as f64 * modifiers.minor_fail_qi_loss_ratio) as i64;

    let success_roll = rng.next_pct();
    result.rolls.success_roll_pct = Some(success_roll);
    if success_roll < success_pct {
        result.outcome = BreakthroughOutcome::Success;
        result.next_difficulty_index = stage.difficulty_index + 1;
        result.qi_delta = -required;
        return Ok(result);
    }

    let Some(weights) = failure_weights else {
        result.outcome = BreakthroughOutcome::MinorFail;
        result.qi_delta = -(required + minor_loss);
        result.material_loss_pct = modifiers.minor_fail_material_loss_pct;
        return Ok(result);
    };

    let failure_roll = rng.next_pct();
    result.rolls.failure_roll_pct = Some(failure_roll);
    if failure_roll < weights.death_pct {
        result.outcome = BreakthroughOutcome::DeathFail;
        result.next_difficulty_index = 1;
        result.qi_delta = -(input.current_qi as i64);
    } else if failure_roll < weights.death_pct + weights.retreat_pct {
        let layers = sample_retreat_layers(&mut rng, weights.retreat_min_layers, weights.retreat_max_layers);
        result.outcome = BreakthroughOutcome::RetreatFail;
        result.retreat_layers = layers;
        result.next_difficulty_index = stage.difficulty_index.saturating_sub(layers).max(1);
        result.qi_delta = -required;
    } else {
        result.outcome = BreakthroughOutcome::MinorFail;
        result.qi_delta = -(required + minor_loss);
        result.material_loss_pct = modifiers.minor_fail_material_loss_pct;
    }
    Ok(result)
}

// =============================================================================
// TRIALS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BreakthroughTrialInput {
    /// Template attempt; its `rng_seed` is replaced per trial.
    pub attempt: BreakthroughAttemptInput,
    pub trials: u32,
    pub seed: u32,
}

impl Default for BreakthroughTrialInput {
    fn default() -> Self {
        Self {
            attempt: BreakthroughAttemptInput::default(),
            trials: 1_000,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub blocked_no_qi: u32,
    pub success: u32,
    pub minor_fail: u32,
    pub retreat_fail: u32,
    pub death_fail: u32,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: BreakthroughOutcome) {
        *self.slot(outcome) += 1;
    }

    pub fn get(&self, outcome: BreakthroughOutcome) -> u32 {
        match outcome {
            BreakthroughOutcome::BlockedNoQi => self.blocked_no_qi,
            BreakthroughOutcome::Success => self.success,
            BreakthroughOutcome::MinorFail => self.minor_fail,
            BreakthroughOutcome::RetreatFail => self.retreat_fail,
            BreakthroughOutcome::DeathFail => self.death_fail,
        }
    }

    fn slot(&mut self, outcome: BreakthroughOutcome) -> &mut u32 {
        match outcome {
            BreakthroughOutcome::BlockedNoQi => &mut self.blocked_no_qi,
            BreakthroughOutcome::Success => &mut self.success,
            BreakthroughOutcome::MinorFail => &mut self.minor_fail,
            BreakthroughOutcome::RetreatFail => &mut self.retreat_fail,
            BreakthroughOutcome::DeathFail => &mut self.death_fail,
        }
    }

    pub fn total(&self) -> u32 {
        BreakthroughOutcome::ALL.iter().map(|&o| self.get(o)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OutcomeRates {
    pub blocked_no_qi: f64,
    pub success: f64,
    pub minor_fail: f64,
    pub retreat_fail: f64,
    pub death_fail: f64,
}

impl OutcomeRates {
    pub fn from_counts(counts: &OutcomeCounts, trials: u32) -> Self {
        let n = f64::from(trials.max(1));
        Self {
            blocked_no_qi: f64::from(counts.blocked_no_qi) / n,
            success: f64::from(counts.success) / n,
            minor_fail: f64::from(counts.minor_fail) / n,
            retreat_fail: f64::from(counts.retreat_fail) / n,
            death_fail: f64::from(counts.death_fail) / n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakthroughTrialReport {
    pub difficulty_index: u32,
    pub trials: u32,
    pub seed: u32,
    pub sample: BreakthroughAttemptResult,
    pub counts: OutcomeCounts,
    pub rates: OutcomeRates,
    pub avg_retreat_layers_when_retreat: f64,
    pub avg_qi_delta: f64,
}

/// Run `trials` independent attempts seeded `seed + i * 1009`.
pub fn run_breakthrough_trials(
    indexes: &BalanceIndexes,
    input: &BreakthroughTrialInput,
) -> SimResult<BreakthroughTrialReport> {
    let trials = input.trials.max(1);
    let mut counts = OutcomeCounts::default();
    let mut qi_delta_sum = 0.0;
    let mut retreat_count = 0u32;
    let mut retreat_layers_sum = 0u64;
    let mut sample: Option<BreakthroughAttemptResult> = None;

    let mut attempt = input.attempt.clone();
    for i in 0..trials {
        attempt.rng_seed = derive_seed(input.seed, u64::from(i));
        let result = evaluate_breakthrough_attempt(indexes, &attempt)?;
        counts.record(result.outcome);
        qi_delta_sum += result.qi_delta as f64;
        if result.outcome == BreakthroughOutcome::RetreatFail {
            retreat_count += 1;
            retreat_layers_sum += u64::from(result.retreat_layers);
        }
        if sample.is_none() {
            sample = Some(result);
        }
    }

    let sample = sample.ok_or_else(|| SimError::Invariant("no trial result".to_string()))?;
    Ok(BreakthroughTrialReport {
        difficulty_index: input.attempt.difficulty_index,
        trials,
        seed: input.seed,
        sample,
        counts,
        rates: OutcomeRates::from_counts(&counts, trials),
        avg_retreat_layers_when_retreat: if retreat_count > 0 {
            retreat_layers_sum as f64 / f64::from(retreat_count)
        } else {
            0.0
        },
        avg_qi_delta: qi_delta_sum / f64::from(trials),
    })
}
