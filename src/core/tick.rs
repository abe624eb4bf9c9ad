//! Auto-progress tick loop: the central orchestration over simulated time.
//!
//! [`run_auto_progress`] advances a save by `duration_sec` in `tick_sec`
//! steps. Each tick adds passive qi, runs an auto battle when the battle
//! cadence is due, and checks for a breakthrough on its own cadence. It
//! returns an [`AutoProgressResult`] describing what happened; the input save
//! is never touched.

use super::balance::{BalanceIndexes, MonsterType};
use super::constants::*;
use super::cultivation::{
    calc_battle_reward, cultivated_qi, pick_combat_skills, pick_monster, pick_player_level, MonsterWeights,
};
use super::error::SimResult;
use super::rng::{wrap_seed, SeededRng, DEFAULT_SEED, SUB_SEED_PRIME};
use crate::character::rebirth::RebirthOnDeathConfig;
use crate::character::save::SaveV2;
use crate::combat::report::{run_duel_against, CombatReportConfig};
use crate::combat::types::Side;
use crate::core::combat_math::clamp;
use crate::progression::breakthrough::{apply_breakthrough_step, BreakthroughStepOptions};
use crate::progression::tribulation::{BreakthroughOutcome, OutcomeCounts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Cadence and breakthrough knobs for one auto-progress run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoProgressConfig {
    pub duration_sec: u64,
    pub tick_sec: u64,
    pub rng_seed: u32,
    pub battle_interval_sec: u64,
    pub breakthrough_check_interval_sec: u64,
    pub max_event_logs: usize,
    pub status_penalty_pct: f64,
    pub defensive_skill_guard_pct: f64,
    pub breakthrough_consumable_item_ids: Vec<String>,
    pub tribulation_consumable_item_ids: Vec<String>,
    pub rebirth_on_death: RebirthOnDeathConfig,
    pub monster_weights: MonsterWeights,
}

impl Default for AutoProgressConfig {
    fn default() -> Self {
        Self {
            duration_sec: AUTO_DURATION_SEC_DEFAULT,
            tick_sec: AUTO_TICK_SEC_DEFAULT,
            rng_seed: DEFAULT_SEED,
            battle_interval_sec: AUTO_BATTLE_INTERVAL_SEC_DEFAULT,
            breakthrough_check_interval_sec: AUTO_BREAKTHROUGH_CHECK_SEC_DEFAULT,
            max_event_logs: AUTO_MAX_EVENT_LOGS_DEFAULT,
            status_penalty_pct: 0.0,
            defensive_skill_guard_pct: 0.0,
            breakthrough_consumable_item_ids: Vec::new(),
            tribulation_consumable_item_ids: Vec::new(),
            rebirth_on_death: RebirthOnDeathConfig::default(),
            monster_weights: MonsterWeights::default(),
        }
    }
}

impl AutoProgressConfig {
    /// Durations and intervals floored at 1, seed floored at 1, penalty and
    /// guard clamped to `[0, 95]`.
    pub fn normalized(&self) -> Self {
        let pct = |v: f64| if v.is_finite() { clamp(v, 0.0, AUTO_PENALTY_GUARD_MAX_PCT) } else { 0.0 };
        Self {
            duration_sec: self.duration_sec.max(1),
            tick_sec: self.tick_sec.max(1),
            rng_seed: self.rng_seed.max(1),
            battle_interval_sec: self.battle_interval_sec.max(1),
            breakthrough_check_interval_sec: self.breakthrough_check_interval_sec.max(1),
            status_penalty_pct: pct(self.status_penalty_pct),
            defensive_skill_guard_pct: pct(self.defensive_skill_guard_pct),
            ..self.clone()
        }
    }
}

/// What a logged event was about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AutoEventDetail {
    #[serde(rename_all = "camelCase")]
    Battle {
        monster_id: String,
        monster_type: MonsterType,
        winner: Side,
        spirit_coin: u64,
        rebirth_essence: u64,
        qi: i64,
    },
    #[serde(rename_all = "camelCase")]
    Breakthrough {
        outcome: BreakthroughOutcome,
        difficulty_before: u32,
        difficulty_after: u32,
        stage_before: String,
        stage_after: String,
        qi_after: u64,
    },
    #[serde(rename_all = "camelCase")]
    Rebirth {
        reward: u64,
        difficulty_after: u32,
        rebirth_count_after: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoEvent {
    pub at_sec: u64,
    #[serde(flatten)]
    pub detail: AutoEventDetail,
}

/// Event log that keeps the earliest `cap` entries and drops the rest.
#[derive(Debug, Clone, Default)]
struct EventLog {
    cap: usize,
    events: Vec<AutoEvent>,
}

impl EventLog {
    fn new(cap: usize) -> Self {
        Self { cap, events: Vec::new() }
    }

    fn push(&mut self, at_sec: u64, detail: AutoEventDetail) {
        if self.events.len() < self.cap {
            self.events.push(AutoEvent { at_sec, detail });
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleTally {
    pub total: u32,
    pub wins: u32,
    pub losses: u32,
    pub spirit_coin_gain: u64,
    pub rebirth_essence_gain: u64,
    pub qi_gain: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakthroughTally {
    pub attempts: u32,
    /// Checks where qi sufficed but the auto setting for the stage was off.
    pub blocked_by_auto_setting: u32,
    /// Per outcome. `blocked_no_qi` counts checks with the setting on but qi short.
    pub outcomes: OutcomeCounts,
    pub rebirth_triggered: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoProgressSummary {
    pub duration_sec: u64,
    pub ticks: u64,
    pub final_difficulty_index: u32,
    pub final_stage_name: String,
    pub qi_delta: i64,
    pub spirit_coin_delta: i64,
    pub rebirth_essence_delta: i64,
    pub rebirth_count_delta: i64,
    pub battles: BattleTally,
    pub breakthroughs: BreakthroughTally,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoProgressResult {
    pub save: SaveV2,
    pub summary: AutoProgressSummary,
    pub event_logs: Vec<AutoEvent>,
    pub warnings: Vec<String>,
}

fn signed_delta(after: u64, before: u64) -> i64 {
    if after >= before {
        i64::try_from(after - before).unwrap_or(i64::MAX)
    } else {
        -i64::try_from(before - after).unwrap_or(i64::MAX)
    }
}

/// Warnings in first-seen order without repeats.
pub(crate) fn dedup_warnings(warnings: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    warnings.into_iter().filter(|w| seen.insert(w.clone())).collect()
}

/// Run one auto battle for the current stage and apply its reward.
fn run_auto_battle(
    indexes: &BalanceIndexes,
    save: &mut SaveV2,
    config: &AutoProgressConfig,
    rng: &mut SeededRng,
    battle_seed: u32,
) -> SimResult<AutoEventDetail> {
    let stage = indexes.stage(save.progression.difficulty_index)?;
    let monster = pick_monster(indexes, stage.world, &config.monster_weights, rng)?;
    let combat = CombatReportConfig {
        difficulty_index: stage.difficulty_index,
        player_level: pick_player_level(stage.difficulty_index),
        rebirth_count: save.progression.rebirth_count,
        rng_seed: battle_seed,
        skill_ids: pick_combat_skills(indexes, stage.difficulty_index, stage.world),
        monster_ids: Vec::new(),
        max_turns_per_battle: AUTO_BATTLE_MAX_TURNS,
        include_action_logs: false,
    };
    let duel = run_duel_against(indexes, &combat, monster)?;
    let reward = calc_battle_reward(stage, monster, duel.player_won(), rng);

    let currencies = &mut save.currencies;
    currencies.spirit_coin = currencies.spirit_coin.saturating_add(reward.spirit_coin);
    currencies.rebirth_essence = currencies.rebirth_essence.saturating_add(reward.rebirth_essence);
    currencies.qi = currencies.qi.saturating_add_signed(reward.qi);

    debug!(
        monster = %duel.monster_id,
        winner = ?duel.winner,
        turns = duel.turns,
        qi = reward.qi,
        "auto battle resolved"
    );
    Ok(AutoEventDetail::Battle {
        monster_id: duel.monster_id,
        monster_type: monster.monster_type,
        winner: duel.winner,
        spirit_coin: reward.spirit_coin,
        rebirth_essence: reward.rebirth_essence,
        qi: reward.qi,
    })
}

/// Advance `input` by `config.duration_sec` of simulated time.
///
/// Deterministic for fixed (tables, save, config). Battle sub-seeds are
/// `seed + battles * 1009 + elapsed`; breakthrough sub-seeds are
/// `seed + elapsed * 13 + battles * 17`.
///
/// # Errors
/// Any fatal error from the stage lookups, monster picks or the duel and
/// breakthrough engines.
pub fn run_auto_progress(
    indexes: &BalanceIndexes,
    input: &SaveV2,
    config: &AutoProgressConfig,
) -> SimResult<AutoProgressResult> {
    let config = config.normalized();
    let mut save = input.clone();
    let mut rng = SeededRng::new(config.rng_seed);
    let mut log = EventLog::new(config.max_event_logs);
    let mut warnings: Vec<String> = Vec::new();
    let mut battles = BattleTally::default();
    let mut breakthroughs = BreakthroughTally::default();

    let seed = u64::from(config.rng_seed);
    let mut elapsed: u64 = 0;
    let mut ticks: u64 = 0;
    let mut next_battle_at = config.battle_interval_sec as f64;
    let mut next_check_at = config.breakthrough_check_interval_sec;
    let mut battle_counter: u64 = 0;

    while elapsed < config.duration_sec {
        elapsed += config.tick_sec;
        ticks += 1;

        let stage = indexes.stage(save.progression.difficulty_index)?;
        let gained = cultivated_qi(indexes, stage, save.progression.rebirth_count, config.tick_sec);
        save.currencies.qi = save.currencies.qi.saturating_add(gained);

        if save.settings.auto_battle && elapsed as f64 >= next_battle_at {
            let battle_seed = wrap_seed(
                seed.wrapping_add(battle_counter.wrapping_mul(u64::from(SUB_SEED_PRIME)))
                    .wrapping_add(elapsed),
            );
            battle_counter += 1;
            let detail = run_auto_battle(indexes, &mut save, &config, &mut rng, battle_seed)?;
            if let AutoEventDetail::Battle { winner, spirit_coin, rebirth_essence, qi, .. } = &detail {
                battles.total += 1;
                if *winner == Side::Player {
                    battles.wins += 1;
                } else {
                    battles.losses += 1;
                }
                battles.spirit_coin_gain = battles.spirit_coin_gain.saturating_add(*spirit_coin);
                battles.rebirth_essence_gain = battles.rebirth_essence_gain.saturating_add(*rebirth_essence);
                battles.qi_gain = battles.qi_gain.saturating_add(*qi);
            }
            log.push(elapsed, detail);
            next_battle_at += config.battle_interval_sec as f64 / f64::from(save.settings.battle_speed.max(1));
        }

        if elapsed >= next_check_at {
            let current = indexes.stage(save.progression.difficulty_index)?;
            let is_tribulation = current.is_tribulation;
            let auto_enabled = if is_tribulation {
                save.settings.auto_tribulation
            } else {
                save.settings.auto_breakthrough
            };
            let ready = save.currencies.qi >= current.qi_required;

            if !ready {
                if auto_enabled {
                    breakthroughs.outcomes.record(BreakthroughOutcome::BlockedNoQi);
                }
            } else if !auto_enabled {
                breakthroughs.blocked_by_auto_setting += 1;
            } else {
                let options = BreakthroughStepOptions {
                    rng_seed: wrap_seed(
                        seed.wrapping_add(elapsed.wrapping_mul(BREAKTHROUGH_SEED_ELAPSED_MULT))
                            .wrapping_add(battle_counter.wrapping_mul(BREAKTHROUGH_SEED_BATTLE_MULT)),
                    ),
                    status_penalty_pct: config.status_penalty_pct,
                    defensive_skill_guard_pct: config.defensive_skill_guard_pct,
                    consumable_item_ids: if is_tribulation {
                        config.tribulation_consumable_item_ids.clone()
                    } else {
                        config.breakthrough_consumable_item_ids.clone()
                    },
                    rebirth_on_death: config.rebirth_on_death.clone(),
                    consume_inventory_items: true,
                    ..BreakthroughStepOptions::default()
                };
                let step = apply_breakthrough_step(indexes, &save, &options)?;
                warnings.extend(step.warnings.iter().cloned());

                if let (true, Some(attempt)) = (step.attempted, step.attempt_result.as_ref()) {
                    breakthroughs.attempts += 1;
                    breakthroughs.outcomes.record(attempt.outcome);
                    debug!(
                        elapsed,
                        outcome = attempt.outcome.as_str(),
                        before = step.stage_before.difficulty_index,
                        after = step.stage_after.difficulty_index,
                        "auto breakthrough resolved"
                    );
                    if let Some(settlement) = step.rebirth_settlement.as_ref().filter(|s| s.triggered) {
                        breakthroughs.rebirth_triggered += 1;
                        log.push(
                            elapsed,
                            AutoEventDetail::Rebirth {
                                reward: settlement.reward.final_essence,
                                difficulty_after: settlement.resets.difficulty_index,
                                rebirth_count_after: settlement.post_rebirth_count,
                            },
                        );
                    }
                    log.push(
                        elapsed,
                        AutoEventDetail::Breakthrough {
                            outcome: attempt.outcome,
                            difficulty_before: step.stage_before.difficulty_index,
                            difficulty_after: step.stage_after.difficulty_index,
                            stage_before: step.stage_before.stage_name.clone(),
                            stage_after: step.stage_after.stage_name.clone(),
                            qi_after: step.save.currencies.qi,
                        },
                    );
                }
                save = step.save;
            }
            next_check_at += config.breakthrough_check_interval_sec;
        }
    }

    save.timestamps.save_epoch_ms = save
        .timestamps
        .save_epoch_ms
        .saturating_add(config.duration_sec.saturating_mul(1000));

    let final_stage = indexes.stage(save.progression.difficulty_index)?;
    let summary = AutoProgressSummary {
        duration_sec: config.duration_sec,
        ticks,
        final_difficulty_index: final_stage.difficulty_index,
        final_stage_name: indexes.stage_row_display_name(final_stage),
        qi_delta: signed_delta(save.currencies.qi, input.currencies.qi),
        spirit_coin_delta: signed_delta(save.currencies.spirit_coin, input.currencies.spirit_coin),
        rebirth_essence_delta: signed_delta(save.currencies.rebirth_essence, input.currencies.rebirth_essence),
        rebirth_count_delta: i64::from(save.progression.rebirth_count) - i64::from(input.progression.rebirth_count),
        battles,
        breakthroughs,
    };

    Ok(AutoProgressResult {
        save,
        summary,
        event_logs: log.events,
        warnings: dedup_warnings(warnings),
    })
}
