//! Passive cultivation and auto-battle economy.
//!
//! Pure formulas used by the tick loop: how much qi a stage yields per
//! second, which loadout and monster an auto battle uses, and what a battle
//! pays out.

use super::balance::{BalanceIndexes, MonsterRow, MonsterType, Phase, SkillCategory, StageRow, World};
use super::combat_math::{clamp, round_half_up};
use super::constants::*;
use super::error::{SimError, SimResult};
use super::rng::SeededRng;
use crate::character::rebirth::{infer_rebirth_level, resolve_rebirth_bonus, RebirthBranch};
use serde::{Deserialize, Serialize};

/// Qi required at the first stage of each world.
fn world_start_qi(world: World) -> f64 {
    match world {
        World::Mortal => 100.0,
        World::Immortal => 450_000.0,
        World::True => 60_000_000.0,
    }
}

/// Cultivation hours of the first stage of each world.
fn world_base_hours(world: World) -> f64 {
    match world {
        World::Mortal => 0.20,
        World::Immortal => 0.34,
        World::True => 0.62,
    }
}

fn phase_bonus(phase: Phase) -> f64 {
    match phase {
        Phase::Early => 0.0,
        Phase::Mid => 0.08,
        Phase::Late => 0.18,
        Phase::Perfect => 0.32,
        Phase::Transcendent => 0.42,
    }
}

/// Baseline hours of passive cultivation needed to fill a stage's qi bar.
pub fn base_stage_cultivation_hours(stage: &StageRow) -> f64 {
    let normalized = (stage.qi_required as f64 / world_start_qi(stage.world)).max(1.0);
    let growth = normalized.powf(CULTIVATION_GROWTH_EXPONENT);
    let difficulty = 1.0 + f64::from(stage.difficulty_index) * CULTIVATION_DIFFICULTY_FACTOR;
    world_base_hours(stage.world) * (1.0 + phase_bonus(stage.phase)) * growth * difficulty
}

/// Passive qi per second at `stage`.
///
/// Cultivation speed and offline efficiency levels are inferred from the
/// rebirth count (`rc / 2` and `rc / 4`); the stage's own offline multiplier
/// adds a small passive bonus on top.
pub fn qi_gain_per_sec(indexes: &BalanceIndexes, stage: &StageRow, rebirth_count: u32) -> f64 {
    let hours = base_stage_cultivation_hours(stage);
    let base = stage.qi_required as f64 / (hours * SECONDS_PER_HOUR).max(1.0);

    let cultivation = resolve_rebirth_bonus(
        indexes,
        RebirthBranch::CultivationSpeed,
        infer_rebirth_level(rebirth_count, CULTIVATION_SPEED_LEVEL_DIVISOR),
    );
    let offline = resolve_rebirth_bonus(
        indexes,
        RebirthBranch::OfflineEfficiency,
        infer_rebirth_level(rebirth_count, OFFLINE_EFFICIENCY_LEVEL_DIVISOR),
    );
    let passive = stage.offline_reward_multiplier * OFFLINE_MULTIPLIER_PASSIVE_SCALE;

    base * (1.0 + cultivation.max(0.0) + offline.max(0.0) + passive)
}

/// Whole qi cultivated over `tick_sec` seconds.
pub fn cultivated_qi(indexes: &BalanceIndexes, stage: &StageRow, rebirth_count: u32, tick_sec: u64) -> u64 {
    round_half_up(qi_gain_per_sec(indexes, stage, rebirth_count) * tick_sec as f64).max(0.0) as u64
}

/// Player level assumed for an auto battle at `difficulty_index`.
pub fn pick_player_level(difficulty_index: u32) -> u32 {
    let raw = (AUTO_PLAYER_LEVEL_BASE + f64::from(difficulty_index) * AUTO_PLAYER_LEVEL_PER_DIFFICULTY).floor();
    clamp(raw, 1.0, f64::from(AUTO_PLAYER_LEVEL_MAX)) as u32
}

/// The strongest active skills unlocked at this point of the ladder.
///
/// Ordered by coefficient (highest first), then by shorter cooldown, then
/// table order. Falls back to the starter pair when nothing qualifies.
pub fn pick_combat_skills(indexes: &BalanceIndexes, difficulty_index: u32, world: World) -> Vec<String> {
    let mut unlocked: Vec<_> = indexes
        .skills()
        .iter()
        .filter(|row| {
            row.category == SkillCategory::Active
                && row.world_unlock.order() <= world.order()
                && row.unlock_difficulty_index <= difficulty_index
        })
        .collect();
    unlocked.sort_by(|a, b| {
        b.damage_coeff
            .total_cmp(&a.damage_coeff)
            .then(a.cooldown_sec.total_cmp(&b.cooldown_sec))
    });

    let picked: Vec<String> = unlocked
        .into_iter()
        .take(AUTO_SKILL_LOADOUT)
        .map(|row| row.skill_id.clone())
        .collect();
    if picked.is_empty() {
        FALLBACK_SKILL_IDS.iter().map(|id| id.to_string()).collect()
    } else {
        picked
    }
}

/// Roll thresholds for the monster type of an auto battle. A type roll at or
/// above `boss_threshold` meets a boss, at or above `elite_threshold` an
/// elite, otherwise a normal monster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonsterWeights {
    pub elite_threshold: f64,
    pub boss_threshold: f64,
}

impl Default for MonsterWeights {
    fn default() -> Self {
        Self {
            elite_threshold: ELITE_ROLL_THRESHOLD,
            boss_threshold: BOSS_ROLL_THRESHOLD,
        }
    }
}

impl MonsterWeights {
    pub fn monster_type(&self, roll: f64) -> MonsterType {
        if roll >= self.boss_threshold {
            MonsterType::Boss
        } else if roll >= self.elite_threshold {
            MonsterType::Elite
        } else {
            MonsterType::Normal
        }
    }
}

/// Pick the opponent for an auto battle. Consumes two rolls: the type, then
/// the index inside the type's bucket (or the whole world pool when the
/// bucket is empty).
///
/// # Errors
/// `NoMonsterCandidates` when the world has no monsters at all.
pub fn pick_monster<'a>(
    indexes: &'a BalanceIndexes,
    world: World,
    weights: &MonsterWeights,
    rng: &mut SeededRng,
) -> SimResult<&'a MonsterRow> {
    let candidates: Vec<&MonsterRow> = indexes.monsters().iter().filter(|m| m.world == world).collect();
    if candidates.is_empty() {
        return Err(SimError::NoMonsterCandidates(world));
    }

    let kind = weights.monster_type(rng.next_f64());
    let bucket: Vec<&MonsterRow> = candidates.iter().copied().filter(|m| m.monster_type == kind).collect();
    let pool = if bucket.is_empty() { &candidates } else { &bucket };
    let idx = ((rng.next_f64() * pool.len() as f64).floor() as usize).min(pool.len() - 1);
    Ok(pool[idx])
}

pub fn reward_type_multiplier(kind: MonsterType) -> f64 {
    match kind {
        MonsterType::Normal => 1.0,
        MonsterType::Elite => 2.2,
        MonsterType::Boss => 4.8,
    }
}

/// Currency movement from one auto battle. `qi` is negative after a loss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleReward {
    pub spirit_coin: u64,
    pub rebirth_essence: u64,
    pub qi: i64,
}

/// Payout of a battle at `stage` against `monster`.
///
/// A loss rolls nothing and costs a small slice of the stage's qi
/// requirement. A win rolls twice: coin variance, then qi variance.
pub fn calc_battle_reward(stage: &StageRow, monster: &MonsterRow, won: bool, rng: &mut SeededRng) -> BattleReward {
    let required = stage.qi_required as f64;
    if !won {
        let penalty = round_half_up(required * REWARD_QI_LOSS_RATIO) as i64;
        return BattleReward {
            qi: -penalty,
            ..BattleReward::default()
        };
    }

    let type_mul = reward_type_multiplier(monster.monster_type);
    let coin_variance = REWARD_VARIANCE_MIN + rng.next_f64() * REWARD_VARIANCE_SPAN;
    let coin_base = REWARD_SPIRIT_BASE + f64::from(stage.difficulty_index) * REWARD_SPIRIT_PER_DIFFICULTY;
    let spirit_coin = round_half_up(coin_base * stage.drop_rate_multiplier * type_mul * coin_variance).max(1.0);

    let rebirth_essence = monster
        .rebirth_essence_drop
        .filter(|v| v.is_finite())
        .map(|drop| round_half_up(drop * type_mul).max(0.0))
        .unwrap_or(0.0);

    let qi_variance = REWARD_VARIANCE_MIN + rng.next_f64() * REWARD_VARIANCE_SPAN;
    let qi = round_half_up(required * REWARD_QI_WIN_RATIO * type_mul * qi_variance).max(1.0);

    BattleReward {
        spirit_coin: spirit_coin as u64,
        rebirth_essence: rebirth_essence as u64,
        qi: qi as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sample::sample_tables;

    fn indexes() -> BalanceIndexes {
        BalanceIndexes::new(sample_tables())
    }

    #[test]
    fn test_cultivation_hours_grow_with_phase() {
        let idx = indexes();
        let early = idx.stage(1).expect("stage");
        let late = idx.stage(3).expect("stage");
        assert!(base_stage_cultivation_hours(late) > base_stage_cultivation_hours(early));
    }

    #[test]
    fn test_first_stage_hours_match_world_base() {
        let idx = indexes();
        let stage = idx.stage(1).expect("stage");
        let expected = 0.20 * 1.0 * (1.0 + 0.0009);
        let hours = base_stage_cultivation_hours(stage);
        assert!((hours - expected).abs() < 1e-9, "hours={}", hours);
    }

    #[test]
    fn test_rebirth_speeds_up_cultivation() {
        let idx = indexes();
        let stage = idx.stage(4).expect("stage");
        let fresh = qi_gain_per_sec(&idx, stage, 0);
        let veteran = qi_gain_per_sec(&idx, stage, 8);
        assert!(fresh > 0.0);
        assert!(veteran > fresh);
    }

    #[test]
    fn test_player_level_clamps() {
        assert_eq!(pick_player_level(0), 8);
        assert_eq!(pick_player_level(20), 19);
        assert_eq!(pick_player_level(10_000), AUTO_PLAYER_LEVEL_MAX);
    }

    #[test]
    fn test_skill_picks_prefer_coefficient() {
        let idx = indexes();
        let picks = pick_combat_skills(&idx, 40, World::Mortal);
        assert_eq!(picks.len(), AUTO_SKILL_LOADOUT);
        let coeffs: Vec<f64> = picks
            .iter()
            .map(|id| idx.skill(id).expect("skill").damage_coeff)
            .collect();
        assert!(coeffs[0] >= coeffs[1]);
        for row in idx.skills() {
            if row.category == SkillCategory::Active
                && row.world_unlock == World::Mortal
                && row.unlock_difficulty_index <= 40
                && !picks.contains(&row.skill_id)
            {
                assert!(row.damage_coeff <= coeffs[1]);
            }
        }
    }

    #[test]
    fn test_skill_picks_fall_back_when_nothing_unlocked() {
        let idx = indexes();
        let picks = pick_combat_skills(&idx, 0, World::Mortal);
        assert_eq!(picks, vec!["sk_atk_001".to_string(), "sk_atk_002".to_string()]);
    }

    #[test]
    fn test_monster_type_thresholds() {
        let weights = MonsterWeights::default();
        assert_eq!(weights.monster_type(0.0), MonsterType::Normal);
        assert_eq!(weights.monster_type(0.69), MonsterType::Normal);
        assert_eq!(weights.monster_type(0.70), MonsterType::Elite);
        assert_eq!(weights.monster_type(0.90), MonsterType::Boss);
    }

    #[test]
    fn test_pick_monster_stays_in_world() {
        let idx = indexes();
        let mut rng = SeededRng::new(7);
        for _ in 0..200 {
            let monster = pick_monster(&idx, World::Mortal, &MonsterWeights::default(), &mut rng).expect("monster");
            assert_eq!(monster.world, World::Mortal);
        }
    }

    #[test]
    fn test_pick_monster_honours_forced_boss() {
        let idx = indexes();
        let weights = MonsterWeights {
            elite_threshold: 0.0,
            boss_threshold: 0.0,
        };
        let mut rng = SeededRng::new(99);
        let monster = pick_monster(&idx, World::Mortal, &weights, &mut rng).expect("monster");
        assert_eq!(monster.monster_type, MonsterType::Boss);
    }

    #[test]
    fn test_pick_monster_errors_on_empty_world() {
        let mut tables = sample_tables();
        tables.monsters.retain(|m| m.world != World::True);
        let idx = BalanceIndexes::new(tables);
        let mut rng = SeededRng::new(1);
        let err = pick_monster(&idx, World::True, &MonsterWeights::default(), &mut rng).unwrap_err();
        assert_eq!(err, SimError::NoMonsterCandidates(World::True));
    }

    #[test]
    fn test_loss_costs_qi_without_rolling() {
        let idx = indexes();
        let stage = idx.stage(10).expect("stage");
        let monster = idx.monster("mob_m_001").expect("monster");
        let mut rng = SeededRng::new(5);
        let before = rng.state();
        let reward = calc_battle_reward(stage, monster, false, &mut rng);
        assert_eq!(rng.state(), before);
        assert_eq!(reward.spirit_coin, 0);
        assert_eq!(reward.rebirth_essence, 0);
        assert_eq!(reward.qi, -(round_half_up(stage.qi_required as f64 * 0.0015) as i64));
    }

    #[test]
    fn test_boss_win_pays_more_than_normal() {
        let idx = indexes();
        let stage = idx.stage(10).expect("stage");
        let normal = idx.monster("mob_m_001").expect("monster");
        let boss = idx.monster("mob_m_008").expect("monster");
        let a = calc_battle_reward(stage, normal, true, &mut SeededRng::new(11));
        let b = calc_battle_reward(stage, boss, true, &mut SeededRng::new(11));
        assert!(a.spirit_coin >= 1 && a.qi >= 1);
        assert!(b.spirit_coin > a.spirit_coin);
        assert!(b.qi > a.qi);
    }
}
