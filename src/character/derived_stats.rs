use crate::combat::types::MonsterMechanic;
use crate::core::balance::{BalanceIndexes, CombatConstants, MonsterRow, StatGrowthRow};
use crate::core::combat_math::clamp;
use crate::core::constants::*;
use crate::core::error::SimResult;
use serde::{Deserialize, Serialize};

/// Player stat identifiers used by the stat growth table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatId {
    Hp,
    Mp,
    Atk,
    Def,
    Speed,
    Accuracy,
    Evasion,
    CritRate,
    CritDamage,
    Penetration,
    DamageReduction,
}

impl StatId {
    pub const ALL: [StatId; 11] = [
        StatId::Hp,
        StatId::Mp,
        StatId::Atk,
        StatId::Def,
        StatId::Speed,
        StatId::Accuracy,
        StatId::Evasion,
        StatId::CritRate,
        StatId::CritDamage,
        StatId::Penetration,
        StatId::DamageReduction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatId::Hp => "hp",
            StatId::Mp => "mp",
            StatId::Atk => "atk",
            StatId::Def => "def",
            StatId::Speed => "speed",
            StatId::Accuracy => "accuracy",
            StatId::Evasion => "evasion",
            StatId::CritRate => "crit_rate",
            StatId::CritDamage => "crit_damage",
            StatId::Penetration => "penetration",
            StatId::DamageReduction => "damage_reduction",
        }
    }
}

/// Combat stats of one unit, computed fresh for every duel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatUnitStats {
    pub hp: f64,
    pub mp: f64,
    pub atk: f64,
    pub def: f64,
    pub speed: f64,
    pub accuracy: f64,
    pub evasion: f64,
    pub crit_rate: f64,
    pub crit_damage: f64,
    pub penetration: f64,
    pub damage_reduction: f64,
}

/// Soft/hard cap curve.
///
/// A negative `hard_cap` leaves the value untouched. Above `soft_cap_start`
/// marginal gains are multiplied by `soft_cap_slope` before the hard cap.
pub fn apply_soft_hard_cap(raw: f64, soft_cap_start: f64, hard_cap: f64, soft_cap_slope: f64) -> f64 {
    if hard_cap < 0.0 {
        return raw;
    }
    let mut value = raw;
    if soft_cap_start >= 0.0 && soft_cap_slope > 0.0 && value > soft_cap_start {
        value = soft_cap_start + (value - soft_cap_start) * soft_cap_slope;
    }
    value.min(hard_cap)
}

/// One stat from its growth row.
///
/// `base + perLevel*(level-1) + perMajor*(major-1) + perSub*(sub-1)`, scaled
/// by rebirth count, then passed through the cap curve.
pub fn grow_stat(row: &StatGrowthRow, level: u32, major_idx: u32, sub_idx: u32, rebirth_count: u32) -> f64 {
    let raw = row.base_value
        + row.per_player_level * f64::from(level.saturating_sub(1))
        + row.per_major_stage * f64::from(major_idx.saturating_sub(1))
        + row.per_sub_stage * f64::from(sub_idx.saturating_sub(1));
    let scaled = raw * (1.0 + f64::from(rebirth_count) * row.rebirth_scale_pct * 0.01);
    apply_soft_hard_cap(scaled, row.soft_cap_start, row.hard_cap, row.soft_cap_slope)
}

/// Derive the player's combat stats for a level, stage position and rebirth count.
///
/// # Errors
/// `MissingStatGrowth` when any of the eleven stat rows is absent.
pub fn derive_unit_stats(
    indexes: &BalanceIndexes,
    constants: &CombatConstants,
    level: u32,
    major_idx: u32,
    sub_idx: u32,
    rebirth_count: u32,
) -> SimResult<CombatUnitStats> {
    let stat = |id: StatId| -> SimResult<f64> {
        Ok(grow_stat(indexes.stat_growth(id)?, level, major_idx, sub_idx, rebirth_count))
    };

    Ok(CombatUnitStats {
        hp: stat(StatId::Hp)?,
        mp: stat(StatId::Mp)?,
        atk: stat(StatId::Atk)?,
        def: stat(StatId::Def)?,
        speed: stat(StatId::Speed)?.max(MIN_ACTION_SPEED),
        accuracy: clamp(
            stat(StatId::Accuracy)?,
            constants.accuracy_floor,
            constants.accuracy_ceiling,
        ),
        evasion: clamp(stat(StatId::Evasion)?, 0.0, constants.evasion_cap),
        crit_rate: clamp(stat(StatId::CritRate)?, 0.0, constants.crit_rate_cap),
        crit_damage: stat(StatId::CritDamage)?.max(0.0),
        penetration: clamp(stat(StatId::Penetration)?, 0.0, PLAYER_PENETRATION_CAP),
        damage_reduction: clamp(
            stat(StatId::DamageReduction)?,
            0.0,
            constants.damage_reduction_cap,
        ),
    })
}

/// Scale the player's stats into a monster's stats.
///
/// Monsters are balanced relative to the player: each multiplier is floored
/// (hp/atk/def 0.5, speed 0.3) and the monster's mechanic may add passive
/// crit, defense or damage reduction.
pub fn derive_monster_stats(
    player: &CombatUnitStats,
    monster: &MonsterRow,
    constants: &CombatConstants,
) -> CombatUnitStats {
    let rule = MonsterMechanic::parse(&monster.special_mechanic)
        .map(MonsterMechanic::rule)
        .unwrap_or_default();

    let hp_mult = monster.hp_mult.unwrap_or(1.0).max(MONSTER_MULT_FLOOR);
    let atk_mult = monster.atk_mult.unwrap_or(1.0).max(MONSTER_MULT_FLOOR);
    let def_mult = monster.def_mult.unwrap_or(1.0).max(MONSTER_MULT_FLOOR);
    let speed_mult = monster.speed_mult.unwrap_or(1.0).max(MONSTER_SPEED_MULT_FLOOR);
    let base_damage_reduction = ((def_mult - 1.0) * MONSTER_DAMAGE_REDUCTION_PER_DEF_MULT).max(0.0);

    CombatUnitStats {
        hp: player.hp * hp_mult * MONSTER_HP_FACTOR,
        mp: 0.0,
        atk: player.atk * atk_mult * MONSTER_ATK_FACTOR,
        def: player.def * def_mult * rule.passive_def_multiplier * MONSTER_DEF_FACTOR,
        speed: (player.speed * speed_mult).max(MIN_ACTION_SPEED),
        accuracy: clamp(
            MONSTER_BASE_ACCURACY + (atk_mult - 1.0) * MONSTER_ACCURACY_PER_ATK_MULT,
            constants.accuracy_floor,
            constants.accuracy_ceiling,
        ),
        evasion: clamp(monster.evasion.unwrap_or(0.0), 0.0, constants.evasion_cap),
        crit_rate: clamp(
            monster.crit_rate.unwrap_or(0.0) + rule.passive_crit_rate_add,
            0.0,
            constants.crit_rate_cap,
        ),
        crit_damage: MONSTER_CRIT_DAMAGE,
        penetration: clamp(
            ((atk_mult - 1.0) * MONSTER_PENETRATION_PER_ATK_MULT).max(0.0),
            0.0,
            MONSTER_PENETRATION_CAP,
        ),
        damage_reduction: clamp(
            base_damage_reduction + rule.passive_damage_reduction_add,
            0.0,
            constants.damage_reduction_cap,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::balance::{MonsterType, World};
    use crate::core::error::SimError;
    use crate::core::sample::sample_tables;

    fn growth(base: f64, per_level: f64, hard: f64, soft: f64, slope: f64) -> StatGrowthRow {
        StatGrowthRow {
            stat_id: StatId::Atk,
            base_value: base,
            per_player_level: per_level,
            per_major_stage: 0.0,
            per_sub_stage: 0.0,
            rebirth_scale_pct: 10.0,
            hard_cap: hard,
            soft_cap_start: soft,
            soft_cap_slope: slope,
        }
    }

    fn monster(mechanic: &str) -> MonsterRow {
        MonsterRow {
            monster_id: "mob_test".to_string(),
            name: "Test Beast".to_string(),
            world: World::Mortal,
            monster_type: MonsterType::Normal,
            element: "fire".to_string(),
            hp_mult: Some(2.0),
            atk_mult: Some(1.5),
            def_mult: Some(0.1),
            speed_mult: None,
            crit_rate: Some(0.05),
            evasion: Some(0.9),
            rebirth_essence_drop: None,
            special_mechanic: mechanic.to_string(),
        }
    }

    fn player() -> CombatUnitStats {
        CombatUnitStats {
            hp: 1000.0,
            mp: 100.0,
            atk: 100.0,
            def: 50.0,
            speed: 1.0,
            accuracy: 0.9,
            evasion: 0.1,
            crit_rate: 0.1,
            crit_damage: 0.5,
            penetration: 0.1,
            damage_reduction: 0.1,
        }
    }

    #[test]
    fn test_cap_negative_hard_cap_is_uncapped() {
        assert_eq!(apply_soft_hard_cap(1e9, 10.0, -1.0, 0.5), 1e9);
    }

    #[test]
    fn test_cap_soft_then_hard() {
        // 10 + (30 - 10) * 0.5 = 20
        assert_eq!(apply_soft_hard_cap(30.0, 10.0, 100.0, 0.5), 20.0);
        assert_eq!(apply_soft_hard_cap(500.0, 10.0, 100.0, 0.5), 100.0);
        assert_eq!(apply_soft_hard_cap(5.0, 10.0, 100.0, 0.5), 5.0);
        // slope 0 disables the soft cap
        assert_eq!(apply_soft_hard_cap(30.0, 10.0, 100.0, 0.0), 30.0);
    }

    #[test]
    fn test_grow_stat_formula() {
        let row = growth(10.0, 2.0, -1.0, -1.0, 0.0);
        // (10 + 2 * 4) * (1 + 2 * 10%) = 18 * 1.2
        let v = grow_stat(&row, 5, 1, 1, 2);
        assert!((v - 21.6).abs() < 1e-9, "got {}", v);
        // level 0 behaves like level 1
        assert_eq!(grow_stat(&row, 0, 0, 0, 0), 10.0);
    }

    #[test]
    fn test_derive_unit_stats_respects_global_caps() {
        let indexes = BalanceIndexes::new(sample_tables());
        let constants = CombatConstants::default();
        for level in [1, 30, 120] {
            let s = derive_unit_stats(&indexes, &constants, level, 5, 5, 40).expect("stats");
            assert!(s.speed >= MIN_ACTION_SPEED);
            assert!(s.accuracy >= constants.accuracy_floor && s.accuracy <= constants.accuracy_ceiling);
            assert!(s.evasion >= 0.0 && s.evasion <= constants.evasion_cap);
            assert!(s.crit_rate >= 0.0 && s.crit_rate <= constants.crit_rate_cap);
            assert!(s.penetration <= PLAYER_PENETRATION_CAP);
            assert!(s.damage_reduction <= constants.damage_reduction_cap);
            assert!(s.hp > 0.0 && s.atk > 0.0);
        }
    }

    #[test]
    fn test_missing_growth_row_is_error() {
        let mut tables = sample_tables();
        tables.stat_growth.retain(|r| r.stat_id != StatId::CritDamage);
        let indexes = BalanceIndexes::new(tables);
        let err = derive_unit_stats(&indexes, &CombatConstants::default(), 10, 1, 1, 0).unwrap_err();
        assert_eq!(err, SimError::MissingStatGrowth("crit_damage".to_string()));
    }

    #[test]
    fn test_monster_stats_scale_from_player() {
        let constants = CombatConstants::default();
        let m = derive_monster_stats(&player(), &monster(""), &constants);
        assert!((m.hp - 1000.0 * 2.0 * 1.05).abs() < 1e-9);
        assert!((m.atk - 100.0 * 1.5 * 0.88).abs() < 1e-9);
        // def_mult floored at 0.5
        assert!((m.def - 50.0 * 0.5 * 0.92).abs() < 1e-9);
        assert_eq!(m.mp, 0.0);
        assert_eq!(m.speed, 1.0);
        assert!((m.accuracy - 0.76).abs() < 1e-9);
        assert_eq!(m.evasion, constants.evasion_cap);
        assert_eq!(m.crit_damage, MONSTER_CRIT_DAMAGE);
        assert!((m.penetration - 0.035).abs() < 1e-9);
        assert_eq!(m.damage_reduction, 0.0);
    }

    #[test]
    fn test_monster_passive_mechanics_apply() {
        let constants = CombatConstants::default();
        let plain = derive_monster_stats(&player(), &monster(""), &constants);
        let crit = derive_monster_stats(&player(), &monster("high_crit"), &constants);
        assert!((crit.crit_rate - (plain.crit_rate + 0.08)).abs() < 1e-9);

        let barrier = derive_monster_stats(&player(), &monster("law_barrier"), &constants);
        assert!((barrier.def - plain.def * 1.18).abs() < 1e-9);
        assert!((barrier.damage_reduction - 0.16).abs() < 1e-9);
    }
}
