//! Applying one breakthrough attempt to a save snapshot.
//!
//! The input save is borrowed and never mutated; every result carries a
//! fresh snapshot. Stage fields on the save are always re-derived from the
//! resulting difficulty index.

use super::tribulation::{evaluate_breakthrough_attempt, BreakthroughAttemptInput, BreakthroughAttemptResult, BreakthroughOutcome};
use crate::character::rebirth::{calc_rebirth_essence_reward, EssenceReward, RebirthLevelOverrides, RebirthLevels, RebirthOnDeathConfig};
use crate::character::save::{SaveProgression, SaveV2};
use crate::core::balance::{BalanceIndexes, StageRow, World};
use crate::core::constants::STREAK_COUNTER_CAP;
use crate::core::error::SimResult;
use crate::core::rng::DEFAULT_SEED;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub const REBIRTH_INFERENCE_WARNING: &str =
    "rebirth levels inferred from progression.rebirth_count (override via options.rebirthLevels)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AutoBreakthroughDisabled,
    AutoTribulationDisabled,
}

impl SkipReason {
    fn warning(self) -> &'static str {
        match self {
            SkipReason::AutoBreakthroughDisabled => "auto_breakthrough disabled; no progression step executed",
            SkipReason::AutoTribulationDisabled => "auto_tribulation disabled; no progression step executed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BreakthroughStepOptions {
    pub rng_seed: u32,
    /// Attempt even when the save's auto setting for this stage is off.
    pub force_attempt: bool,
    pub status_penalty_pct: f64,
    pub defensive_skill_guard_pct: f64,
    pub consumable_item_ids: Vec<String>,
    pub rebirth_levels: RebirthLevelOverrides,
    pub infer_rebirth_levels: bool,
    pub consume_inventory_items: bool,
    /// When set, `timestamps.save_epoch_ms` is bumped to this value after an attempt.
    pub now_epoch_ms: Option<u64>,
    pub rebirth_on_death: RebirthOnDeathConfig,
}

impl Default for BreakthroughStepOptions {
    fn default() -> Self {
        Self {
            rng_seed: DEFAULT_SEED,
            force_attempt: false,
            status_penalty_pct: 0.0,
            defensive_skill_guard_pct: 0.0,
            consumable_item_ids: Vec::new(),
            rebirth_levels: RebirthLevelOverrides::default(),
            infer_rebirth_levels: true,
            consume_inventory_items: true,
            now_epoch_ms: None,
            rebirth_on_death: RebirthOnDeathConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSnapshot {
    pub difficulty_index: u32,
    pub world: World,
    pub stage_name: String,
    pub is_tribulation: bool,
}

impl StageSnapshot {
    fn of(indexes: &BalanceIndexes, stage: &StageRow) -> Self {
        Self {
            difficulty_index: stage.difficulty_index,
            world: stage.world,
            stage_name: indexes.stage_row_display_name(stage),
            is_tribulation: stage.is_tribulation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebirthResets {
    pub difficulty_index: u32,
    pub qi_reset_applied: bool,
    pub spirit_coin_reset_applied: bool,
    pub unlocked_nodes_cleared: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebirthSettlement {
    pub triggered: bool,
    pub pre_rebirth_count: u32,
    pub post_rebirth_count: u32,
    pub reward: EssenceReward,
    pub resets: RebirthResets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakthroughStepResult {
    pub save: SaveV2,
    pub attempted: bool,
    pub skip_reason: Option<SkipReason>,
    pub attempt_result: Option<BreakthroughAttemptResult>,
    pub stage_before: StageSnapshot,
    pub stage_after: StageSnapshot,
    pub resolved_rebirth_levels: RebirthLevels,
    pub rebirth_settlement: Option<RebirthSettlement>,
    pub consumed_item_counts: BTreeMap<String, u32>,
    pub warnings: Vec<String>,
}

fn bump_counter(value: u32) -> u32 {
    value.saturating_add(1).min(STREAK_COUNTER_CAP)
}

/// Overwrite the stage fields of `progression` from the row at `difficulty_index`.
pub fn set_progression_stage(
    progression: &mut SaveProgression,
    indexes: &BalanceIndexes,
    difficulty_index: u32,
) -> SimResult<()> {
    let row = indexes.stage(difficulty_index)?;
    progression.difficulty_index = row.difficulty_index;
    progression.world = row.world;
    progression.major_stage_name = row.major_stage_name.clone();
    progression.sub_stage_name = row.sub_stage_name.clone();
    Ok(())
}

fn resolve_levels(save: &SaveV2, options: &BreakthroughStepOptions) -> (RebirthLevels, Option<&'static str>) {
    if options.infer_rebirth_levels {
        let inferred = RebirthLevels::inferred(save.progression.rebirth_count);
        (options.rebirth_levels.resolve(inferred), Some(REBIRTH_INFERENCE_WARNING))
    } else {
        (options.rebirth_levels.resolve(RebirthLevels::default()), None)
    }
}

/// Keep only requested consumables the inventory can cover, one unit per
/// request. Without inventory consumption every request passes through.
fn usable_consumables(save: &SaveV2, requested: &[String], consume: bool) -> (Vec<String>, Vec<String>) {
    if !consume {
        return (requested.to_vec(), Vec::new());
    }
    let mut remaining: BTreeMap<&str, u32> = BTreeMap::new();
    let mut usable = Vec::new();
    let mut warnings = Vec::new();
    for item_id in requested {
        let left = remaining
            .entry(item_id.as_str())
            .or_insert_with(|| save.inventory.quantity(item_id).min(STREAK_COUNTER_CAP));
        if *left == 0 {
            warn!(item_id = %item_id, "requested consumable not in inventory");
            warnings.push(format!("consumable not available in inventory: {}", item_id));
            continue;
        }
        *left -= 1;
        usable.push(item_id.clone());
    }
    (usable, warnings)
}

/// Run one breakthrough attempt for `save` and settle its result.
///
/// Returns a skipped result when the save's auto setting for the current
/// stage kind is off and `force_attempt` is not set.
///
/// # Errors
/// `MissingStage` when the current, next or reset difficulty index has no row
/// (a missing reset row falls back to index 1 with a warning instead).
pub fn apply_breakthrough_step(
    indexes: &BalanceIndexes,
    save: &SaveV2,
    options: &BreakthroughStepOptions,
) -> SimResult<BreakthroughStepResult> {
    let stage_before = indexes.stage(save.progression.difficulty_index)?;
    let before = StageSnapshot::of(indexes, stage_before);
    let is_tribulation = stage_before.is_tribulation;

    if !options.force_attempt {
        let skip = if !is_tribulation && !save.settings.auto_breakthrough {
            Some(SkipReason::AutoBreakthroughDisabled)
        } else if is_tribulation && !save.settings.auto_tribulation {
            Some(SkipReason::AutoTribulationDisabled)
        } else {
            None
        };
        if let Some(reason) = skip {
            return Ok(BreakthroughStepResult {
                save: save.clone(),
                attempted: false,
                skip_reason: Some(reason),
                attempt_result: None,
                stage_after: before.clone(),
                stage_before: before,
                resolved_rebirth_levels: RebirthLevels::default(),
                rebirth_settlement: None,
                consumed_item_counts: BTreeMap::new(),
                warnings: vec![reason.warning().to_string()],
            });
        }
    }

    let mut warnings: Vec<String> = Vec::new();
    let (levels, inference_warning) = resolve_levels(save, options);
    if let Some(w) = inference_warning {
        warnings.push(w.to_string());
    }

    let (usable_ids, shortfalls) =
        usable_consumables(save, &options.consumable_item_ids, options.consume_inventory_items);
    warnings.extend(shortfalls);

    let fail_streak = if is_tribulation {
        save.pity_counters.tribulation_fail_streak
    } else {
        save.pity_counters.breakthrough_fail_streak
    };

    let attempt = evaluate_breakthrough_attempt(
        indexes,
        &BreakthroughAttemptInput {
            difficulty_index: save.progression.difficulty_index,
            current_qi: save.currencies.qi,
            fail_streak,
            status_penalty_pct: options.status_penalty_pct,
            defensive_skill_guard_pct: options.defensive_skill_guard_pct,
            rebirth_levels: levels,
            consumable_item_ids: usable_ids,
            rng_seed: options.rng_seed,
            ..BreakthroughAttemptInput::default()
        },
    )?;
    warnings.extend(attempt.warnings.iter().cloned());

    let mut next = save.clone();
    let mut settlement = None;
    let mut consumed: BTreeMap<String, u32> = BTreeMap::new();

    if attempt.attempted {
        if options.consume_inventory_items {
            for item_id in &attempt.consumables.used_item_ids {
                *consumed.entry(item_id.clone()).or_insert(0) += 1;
            }
            for (item_id, count) in &consumed {
                next.inventory.consume(item_id, *count);
            }
        }

        next.currencies.qi = next.currencies.qi.saturating_add_signed(attempt.qi_delta);
        set_progression_stage(&mut next.progression, indexes, attempt.next_difficulty_index)?;

        if attempt.outcome == BreakthroughOutcome::DeathFail {
            settlement = Some(settle_rebirth(indexes, &mut next, stage_before, &attempt, options, &mut warnings)?);
        }

        let streak = if is_tribulation {
            &mut next.pity_counters.tribulation_fail_streak
        } else {
            &mut next.pity_counters.breakthrough_fail_streak
        };
        *streak = match attempt.outcome {
            BreakthroughOutcome::Success | BreakthroughOutcome::DeathFail => 0,
            _ => bump_counter(*streak),
        };

        if let Some(now) = options.now_epoch_ms {
            next.timestamps.save_epoch_ms = now;
        }
    }

    let after = StageSnapshot::of(indexes, indexes.stage(next.progression.difficulty_index)?);
    Ok(BreakthroughStepResult {
        save: next,
        attempted: attempt.attempted,
        skip_reason: None,
        attempt_result: Some(attempt),
        stage_before: before,
        stage_after: after,
        resolved_rebirth_levels: levels,
        rebirth_settlement: settlement,
        consumed_item_counts: consumed,
        warnings,
    })
}

/// Rebirth bookkeeping after a death. The rebirth count always advances and
/// both streaks reset; reward and resets apply only when enabled.
fn settle_rebirth(
    indexes: &BalanceIndexes,
    next: &mut SaveV2,
    stage_before: &StageRow,
    attempt: &BreakthroughAttemptResult,
    options: &BreakthroughStepOptions,
    warnings: &mut Vec<String>,
) -> SimResult<RebirthSettlement> {
    let config = &options.rebirth_on_death;
    let pre = next.progression.rebirth_count.min(STREAK_COUNTER_CAP);
    let post = bump_counter(pre);
    next.progression.rebirth_count = post;
    next.pity_counters.breakthrough_fail_streak = 0;
    next.pity_counters.tribulation_fail_streak = 0;

    if !config.enabled {
        warnings.push("rebirthOnDeath.enabled=false; death settlement reset/reward skipped".to_string());
        return Ok(RebirthSettlement {
            triggered: true,
            pre_rebirth_count: pre,
            post_rebirth_count: post,
            reward: EssenceReward::none(),
            resets: RebirthResets {
                difficulty_index: next.progression.difficulty_index,
                qi_reset_applied: false,
                spirit_coin_reset_applied: false,
                unlocked_nodes_cleared: false,
            },
        });
    }

    let reward = calc_rebirth_essence_reward(stage_before, pre, &attempt.consumables.contributions, config);
    next.currencies.rebirth_essence = next
        .currencies
        .rebirth_essence
        .saturating_add(reward.final_essence)
        .min(u64::from(STREAK_COUNTER_CAP));

    let target = config.reset_difficulty_index.min(STREAK_COUNTER_CAP);
    let reset_index = if indexes.has_stage(target) {
        target
    } else {
        warnings.push(format!("rebirth reset difficulty missing: {}; fallback to 1", target));
        1
    };
    set_progression_stage(&mut next.progression, indexes, reset_index)?;

    if config.reset_qi {
        next.currencies.qi = 0;
    }
    if config.reset_spirit_coin {
        next.currencies.spirit_coin = 0;
    }
    if config.clear_unlocked_nodes {
        next.progression.unlocked_nodes.clear();
    }

    Ok(RebirthSettlement {
        triggered: true,
        pre_rebirth_count: pre,
        post_rebirth_count: post,
        reward,
        resets: RebirthResets {
            difficulty_index: reset_index,
            qi_reset_applied: config.reset_qi,
            spirit_coin_reset_applied: config.reset_spirit_coin,
            unlocked_nodes_cleared: config.clear_unlocked_nodes,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::save::SaveInventoryItem;
    use crate::core::error::SimError;
    use crate::core::sample::{sample_save, sample_tables};

    fn indexes() -> BalanceIndexes {
        BalanceIndexes::new(sample_tables())
    }

    fn save_at(idx: &BalanceIndexes, difficulty_index: u32, qi: u64) -> SaveV2 {
        let mut save = sample_save();
        set_progression_stage(&mut save.progression, idx, difficulty_index).expect("stage exists");
        save.currencies.qi = qi;
        save.settings.auto_breakthrough = true;
        save.settings.auto_tribulation = true;
        save
    }

    fn first_tribulation(idx: &BalanceIndexes) -> u32 {
        (1..=idx.stage_count() as u32)
            .find(|&i| idx.stage(i).map(|s| s.is_tribulation).unwrap_or(false))
            .expect("tribulation stage")
    }

    /// First seed in `0..5000` whose attempt at `difficulty_index` ends in `outcome`.
    fn seed_for(idx: &BalanceIndexes, save: &SaveV2, options: &BreakthroughStepOptions, outcome: BreakthroughOutcome) -> u32 {
        (0..5_000u32)
            .find(|&seed| {
                let opts = BreakthroughStepOptions { rng_seed: seed, ..options.clone() };
                apply_breakthrough_step(idx, save, &opts)
                    .ok()
                    .and_then(|r| r.attempt_result.map(|a| a.outcome == outcome))
                    .unwrap_or(false)
            })
            .expect("outcome reachable")
    }

    #[test]
    fn test_skip_when_auto_breakthrough_off() {
        let idx = indexes();
        let mut save = save_at(&idx, 2, 1_000_000);
        save.settings.auto_breakthrough = false;
        let result = apply_breakthrough_step(&idx, &save, &BreakthroughStepOptions::default()).expect("ok");
        assert!(!result.attempted);
        assert_eq!(result.skip_reason, Some(SkipReason::AutoBreakthroughDisabled));
        assert_eq!(result.save, save);
        assert_eq!(result.warnings, vec!["auto_breakthrough disabled; no progression step executed".to_string()]);
        assert_eq!(result.resolved_rebirth_levels, RebirthLevels::default());
    }

    #[test]
    fn test_skip_when_auto_tribulation_off_unless_forced() {
        let idx = indexes();
        let trib = first_tribulation(&idx);
        let mut save = save_at(&idx, trib, 10_000_000);
        save.settings.auto_tribulation = false;
        let skipped = apply_breakthrough_step(&idx, &save, &BreakthroughStepOptions::default()).expect("ok");
        assert_eq!(skipped.skip_reason, Some(SkipReason::AutoTribulationDisabled));

        let forced = BreakthroughStepOptions { force_attempt: true, ..Default::default() };
        let result = apply_breakthrough_step(&idx, &save, &forced).expect("ok");
        assert!(result.attempted);
        assert_eq!(result.skip_reason, None);
    }

    #[test]
    fn test_input_save_is_not_mutated() {
        let idx = indexes();
        let save = save_at(&idx, 2, 1_000_000);
        let snapshot = save.clone();
        let _ = apply_breakthrough_step(&idx, &save, &BreakthroughStepOptions::default()).expect("ok");
        assert_eq!(save, snapshot);
    }

    #[test]
    fn test_success_advances_and_resets_streak() {
        let idx = indexes();
        let mut save = save_at(&idx, 2, 1_000_000);
        save.pity_counters.breakthrough_fail_streak = 4;
        let options = BreakthroughStepOptions::default();
        let seed = seed_for(&idx, &save, &options, BreakthroughOutcome::Success);
        let result = apply_breakthrough_step(&idx, &save, &BreakthroughStepOptions { rng_seed: seed, ..options }).expect("ok");
        let required = idx.stage(2).expect("stage").qi_required;
        assert_eq!(result.save.progression.difficulty_index, 3);
        assert_eq!(result.save.currencies.qi, 1_000_000 - required);
        assert_eq!(result.save.pity_counters.breakthrough_fail_streak, 0);
        let row = idx.stage(3).expect("stage");
        assert_eq!(result.save.progression.major_stage_name, row.major_stage_name);
        assert_eq!(result.save.progression.sub_stage_name, row.sub_stage_name);
        assert_eq!(result.stage_after.difficulty_index, 3);
    }

    #[test]
    fn test_failure_increments_streak_and_costs_qi() {
        let idx = indexes();
        let save = save_at(&idx, 2, 1_000_000);
        let options = BreakthroughStepOptions { status_penalty_pct: 95.0, ..Default::default() };
        let seed = seed_for(&idx, &save, &options, BreakthroughOutcome::MinorFail);
        let result = apply_breakthrough_step(&idx, &save, &BreakthroughStepOptions { rng_seed: seed, ..options }).expect("ok");
        assert_eq!(result.save.pity_counters.breakthrough_fail_streak, 1);
        assert!(result.save.currencies.qi < save.currencies.qi);
        assert_eq!(result.save.progression.difficulty_index, 2);
    }

    #[test]
    fn test_death_triggers_rebirth() {
        let idx = indexes();
        let trib = first_tribulation(&idx);
        let mut save = save_at(&idx, trib, 10_000_000);
        save.progression.rebirth_count = 3;
        save.pity_counters.breakthrough_fail_streak = 7;
        save.pity_counters.tribulation_fail_streak = 2;
        save.currencies.spirit_coin = 500;
        let options = BreakthroughStepOptions { status_penalty_pct: 95.0, ..Default::default() };
        let seed = seed_for(&idx, &save, &options, BreakthroughOutcome::DeathFail);
        let result = apply_breakthrough_step(&idx, &save, &BreakthroughStepOptions { rng_seed: seed, ..options }).expect("ok");

        assert_eq!(result.save.progression.difficulty_index, 1);
        assert_eq!(result.save.progression.rebirth_count, 4);
        assert_eq!(result.save.pity_counters.breakthrough_fail_streak, 0);
        assert_eq!(result.save.pity_counters.tribulation_fail_streak, 0);
        assert_eq!(result.save.currencies.qi, 0);
        assert_eq!(result.save.currencies.spirit_coin, 0);
        let settlement = result.rebirth_settlement.expect("settled");
        assert_eq!(settlement.pre_rebirth_count, 3);
        assert_eq!(settlement.post_rebirth_count, 4);
        assert!(settlement.reward.final_essence >= 5);
        assert_eq!(
            result.save.currencies.rebirth_essence,
            save.currencies.rebirth_essence + settlement.reward.final_essence
        );
    }

    #[test]
    fn test_death_with_settlement_disabled() {
        let idx = indexes();
        let trib = first_tribulation(&idx);
        let save = save_at(&idx, trib, 10_000_000);
        let options = BreakthroughStepOptions {
            status_penalty_pct: 95.0,
            rebirth_on_death: RebirthOnDeathConfig { enabled: false, ..Default::default() },
            ..Default::default()
        };
        let seed = seed_for(&idx, &save, &options, BreakthroughOutcome::DeathFail);
        let result = apply_breakthrough_step(&idx, &save, &BreakthroughStepOptions { rng_seed: seed, ..options }).expect("ok");
        let settlement = result.rebirth_settlement.expect("settled");
        assert_eq!(settlement.reward.final_essence, 0);
        assert!(!settlement.resets.qi_reset_applied);
        assert_eq!(result.save.progression.rebirth_count, save.progression.rebirth_count + 1);
        assert_eq!(result.save.progression.difficulty_index, 1);
        assert!(result
            .warnings
            .contains(&"rebirthOnDeath.enabled=false; death settlement reset/reward skipped".to_string()));
    }

    #[test]
    fn test_missing_reset_row_falls_back_to_one() {
        let idx = indexes();
        let trib = first_tribulation(&idx);
        let save = save_at(&idx, trib, 10_000_000);
        let options = BreakthroughStepOptions {
            status_penalty_pct: 95.0,
            rebirth_on_death: RebirthOnDeathConfig { reset_difficulty_index: 5_000, ..Default::default() },
            ..Default::default()
        };
        let seed = seed_for(&idx, &save, &options, BreakthroughOutcome::DeathFail);
        let result = apply_breakthrough_step(&idx, &save, &BreakthroughStepOptions { rng_seed: seed, ..options }).expect("ok");
        assert_eq!(result.save.progression.difficulty_index, 1);
        assert!(result.warnings.contains(&"rebirth reset difficulty missing: 5000; fallback to 1".to_string()));
    }

    #[test]
    fn test_inventory_gates_and_consumes() {
        let idx = indexes();
        let mut save = save_at(&idx, 2, 1_000_000);
        save.inventory.items = vec![SaveInventoryItem { item_id: "pill_bt_001".into(), quantity: 1, locked: None }];
        let options = BreakthroughStepOptions {
            consumable_item_ids: vec!["pill_bt_001".into(), "pill_bt_001".into(), "pill_bt_002".into()],
            ..Default::default()
        };
        let result = apply_breakthrough_step(&idx, &save, &options).expect("ok");
        assert!(result.attempted);
        assert_eq!(result.consumed_item_counts.get("pill_bt_001"), Some(&1));
        assert_eq!(result.save.inventory.quantity("pill_bt_001"), 0);
        assert!(result.warnings.contains(&"consumable not available in inventory: pill_bt_001".to_string()));
        assert!(result.warnings.contains(&"consumable not available in inventory: pill_bt_002".to_string()));
    }

    #[test]
    fn test_blocked_attempt_leaves_save_alone() {
        let idx = indexes();
        let save = save_at(&idx, 2, 0);
        let options = BreakthroughStepOptions {
            consumable_item_ids: vec!["pill_bt_001".into()],
            now_epoch_ms: Some(42),
            ..Default::default()
        };
        let result = apply_breakthrough_step(&idx, &save, &options).expect("ok");
        assert!(!result.attempted);
        assert_eq!(result.attempt_result.map(|a| a.outcome), Some(BreakthroughOutcome::BlockedNoQi));
        assert_eq!(result.save, save);
        assert!(result.consumed_item_counts.is_empty());
    }

    #[test]
    fn test_inference_warning_and_overrides() {
        let idx = indexes();
        let mut save = save_at(&idx, 2, 1_000_000);
        save.progression.rebirth_count = 12;
        let options = BreakthroughStepOptions {
            rebirth_levels: RebirthLevelOverrides { potion_mastery: Some(9), ..Default::default() },
            now_epoch_ms: Some(1_234),
            ..Default::default()
        };
        let result = apply_breakthrough_step(&idx, &save, &options).expect("ok");
        assert_eq!(result.resolved_rebirth_levels.breakthrough_bonus, 4);
        assert_eq!(result.resolved_rebirth_levels.potion_mastery, 9);
        assert_eq!(result.warnings.first().map(String::as_str), Some(REBIRTH_INFERENCE_WARNING));
        assert_eq!(result.save.timestamps.save_epoch_ms, 1_234);

        let no_infer = BreakthroughStepOptions { infer_rebirth_levels: false, ..Default::default() };
        let result = apply_breakthrough_step(&idx, &save, &no_infer).expect("ok");
        assert_eq!(result.resolved_rebirth_levels, RebirthLevels::default());
        assert!(!result.warnings.iter().any(|w| w == REBIRTH_INFERENCE_WARNING));
    }

    #[test]
    fn test_missing_current_stage_is_fatal() {
        let idx = indexes();
        let mut save = sample_save();
        save.progression.difficulty_index = 4_321;
        let err = apply_breakthrough_step(&idx, &save, &BreakthroughStepOptions::default()).unwrap_err();
        assert_eq!(err, SimError::MissingStage(4_321));
    }
}
