//! Balance tables and the read-only lookup indexes built from them.
//!
//! The kernel never parses table files itself. Callers hand over a
//! materialized [`BalanceTables`] and the kernel builds [`BalanceIndexes`]
//! once. All maps are ordered so iteration never depends on hashing.

use super::constants::*;
use super::error::{SimError, SimResult};
use crate::character::derived_stats::StatId;
use crate::character::rebirth::RebirthBranch;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// ENUMS
// =============================================================================

/// World tier of a stage, monster or skill unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum World {
    Mortal,
    Immortal,
    True,
}

impl World {
    /// Progression order, 1-based.
    pub fn order(self) -> u32 {
        match self {
            World::Mortal => 1,
            World::Immortal => 2,
            World::True => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            World::Mortal => "mortal",
            World::Immortal => "immortal",
            World::True => "true",
        }
    }
}

impl fmt::Display for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-stage phase inside a major stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Early,
    Mid,
    Late,
    Perfect,
    Transcendent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonsterType {
    Normal,
    Elite,
    Boss,
}

impl MonsterType {
    pub const ALL: [MonsterType; 3] = [MonsterType::Normal, MonsterType::Elite, MonsterType::Boss];

    pub fn as_str(self) -> &'static str {
        match self {
            MonsterType::Normal => "normal",
            MonsterType::Elite => "elite",
            MonsterType::Boss => "boss",
        }
    }
}

impl fmt::Display for MonsterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Active,
    Passive,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Potion,
    Talisman,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeEffectType {
    MulPct,
    FlatPct,
}

// =============================================================================
// ROWS
// =============================================================================

/// One stage of the progression ladder, keyed by `difficulty_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRow {
    pub difficulty_index: u32,
    pub world: World,
    pub world_index: u32,
    pub major_stage_index: u32,
    pub major_stage_name: String,
    pub sub_stage_index: u32,
    pub sub_stage_name: String,
    pub phase: Phase,
    #[serde(with = "int_flag")]
    pub is_tribulation: bool,
    pub qi_required: u64,
    pub base_breakthrough_success_pct: f64,
    pub base_death_pct: f64,
    pub fail_retreat_min: u32,
    pub fail_retreat_max: u32,
    pub rebirth_score_weight: f64,
    pub drop_rate_multiplier: f64,
    pub offline_reward_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRow {
    pub skill_id: String,
    pub name: String,
    pub category: SkillCategory,
    pub world_unlock: World,
    pub unlock_difficulty_index: u32,
    #[serde(default)]
    pub cost_mp: f64,
    #[serde(default)]
    pub cooldown_sec: f64,
    #[serde(default)]
    pub damage_coeff: f64,
    #[serde(default)]
    pub element: String,
    #[serde(default)]
    pub status_effect: String,
    #[serde(default)]
    pub status_chance_pct: f64,
    #[serde(default)]
    pub status_duration_sec: f64,
}

/// Monster template. Multipliers are relative to the player's own stats;
/// missing multipliers count as 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterRow {
    pub monster_id: String,
    pub name: String,
    pub world: World,
    #[serde(rename = "type")]
    pub monster_type: MonsterType,
    #[serde(default)]
    pub element: String,
    #[serde(default)]
    pub hp_mult: Option<f64>,
    #[serde(default)]
    pub atk_mult: Option<f64>,
    #[serde(default)]
    pub def_mult: Option<f64>,
    #[serde(default)]
    pub speed_mult: Option<f64>,
    #[serde(default)]
    pub crit_rate: Option<f64>,
    #[serde(default)]
    pub evasion: Option<f64>,
    #[serde(default)]
    pub rebirth_essence_drop: Option<f64>,
    #[serde(default)]
    pub special_mechanic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebirthUpgradeRow {
    pub branch: RebirthBranch,
    pub level: u32,
    #[serde(default)]
    pub cost_rebirth_essence: u64,
    pub effect_type: UpgradeEffectType,
    pub effect_value: f64,
}

/// Potion or talisman. `effect_value` is kept raw; a non-numeric value is
/// reported as a warning when the item is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumableRow {
    pub item_id: String,
    pub item_type: ItemType,
    pub name: String,
    pub effect_type: String,
    pub effect_value: String,
}

/// Failure split for one tribulation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureWeightRow {
    pub difficulty_index: u32,
    pub weight_minor_fail: f64,
    pub weight_retreat_fail: f64,
    #[serde(default)]
    pub weight_death_fail: f64,
    #[serde(default)]
    pub retreat_min_layers: Option<f64>,
    #[serde(default)]
    pub retreat_max_layers: Option<f64>,
}

/// Growth coefficients for one player stat. A negative `hard_cap` means
/// uncapped; a negative `soft_cap_start` disables the soft cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatGrowthRow {
    pub stat_id: StatId,
    pub base_value: f64,
    pub per_player_level: f64,
    pub per_major_stage: f64,
    pub per_sub_stage: f64,
    pub rebirth_scale_pct: f64,
    pub hard_cap: f64,
    pub soft_cap_start: f64,
    pub soft_cap_slope: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatConstantRow {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageLocaleRow {
    pub world: World,
    pub major_stage_name: String,
    pub sub_stage_name: String,
    pub display_name: String,
}

/// Every table the kernel reads, as handed over by the balance provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceTables {
    pub progression: Vec<StageRow>,
    pub skills: Vec<SkillRow>,
    pub monsters: Vec<MonsterRow>,
    pub rebirth_upgrades: Vec<RebirthUpgradeRow>,
    pub consumables: Vec<ConsumableRow>,
    pub failure_weights: Vec<FailureWeightRow>,
    pub stat_growth: Vec<StatGrowthRow>,
    pub combat_constants: Vec<CombatConstantRow>,
    pub stage_locales: Vec<StageLocaleRow>,
}

// =============================================================================
// INDEXES
// =============================================================================

/// Read-only lookups over [`BalanceTables`].
///
/// Skills and monsters keep table order because fallback picks and random
/// monster picks index into that order.
#[derive(Debug, Clone)]
pub struct BalanceIndexes {
    stages: BTreeMap<u32, StageRow>,
    skills: Vec<SkillRow>,
    skill_by_id: BTreeMap<String, usize>,
    monsters: Vec<MonsterRow>,
    monster_by_id: BTreeMap<String, usize>,
    rebirth: BTreeMap<RebirthBranch, BTreeMap<u32, RebirthUpgradeRow>>,
    consumables: BTreeMap<String, ConsumableRow>,
    failure_weights: BTreeMap<u32, FailureWeightRow>,
    stat_growth: BTreeMap<StatId, StatGrowthRow>,
    constants: BTreeMap<String, String>,
    locales: BTreeMap<(World, String, String), String>,
}

impl BalanceIndexes {
    /// Build the indexes. Later duplicate keys win, matching a table reload.
    pub fn new(tables: BalanceTables) -> Self {
        let BalanceTables {
            progression,
            skills,
            monsters,
            rebirth_upgrades,
            consumables,
            failure_weights,
            stat_growth,
            combat_constants,
            stage_locales,
        } = tables;

        let stages = progression
            .into_iter()
            .map(|row| (row.difficulty_index, row))
            .collect();

        let skill_by_id = skills
            .iter()
            .enumerate()
            .map(|(i, row)| (row.skill_id.clone(), i))
            .collect();
        let monster_by_id = monsters
            .iter()
            .enumerate()
            .map(|(i, row)| (row.monster_id.clone(), i))
            .collect();

        let mut rebirth: BTreeMap<RebirthBranch, BTreeMap<u32, RebirthUpgradeRow>> =
            BTreeMap::new();
        for row in rebirth_upgrades {
            rebirth.entry(row.branch).or_default().insert(row.level, row);
        }

        Self {
            stages,
            skills,
            skill_by_id,
            monsters,
            monster_by_id,
            rebirth,
            consumables: consumables
                .into_iter()
                .map(|row| (row.item_id.clone(), row))
                .collect(),
            failure_weights: failure_weights
                .into_iter()
                .map(|row| (row.difficulty_index, row))
                .collect(),
            stat_growth: stat_growth
                .into_iter()
                .map(|row| (row.stat_id, row))
                .collect(),
            constants: combat_constants
                .into_iter()
                .map(|row| (row.key, row.value))
                .collect(),
            locales: stage_locales
                .into_iter()
                .map(|row| {
                    (
                        (row.world, row.major_stage_name, row.sub_stage_name),
                        row.display_name,
                    )
                })
                .collect(),
        }
    }

    /// Stage row for a difficulty index. Missing rows are fatal.
    pub fn stage(&self, difficulty_index: u32) -> SimResult<&StageRow> {
        self.stages
            .get(&difficulty_index)
            .ok_or(SimError::MissingStage(difficulty_index))
    }

    pub fn has_stage(&self, difficulty_index: u32) -> bool {
        self.stages.contains_key(&difficulty_index)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn skills(&self) -> &[SkillRow] {
        &self.skills
    }

    pub fn skill(&self, skill_id: &str) -> Option<&SkillRow> {
        self.skill_by_id.get(skill_id).map(|&i| &self.skills[i])
    }

    pub fn monsters(&self) -> &[MonsterRow] {
        &self.monsters
    }

    pub fn monster(&self, monster_id: &str) -> Option<&MonsterRow> {
        self.monster_by_id.get(monster_id).map(|&i| &self.monsters[i])
    }

    pub fn consumable(&self, item_id: &str) -> Option<&ConsumableRow> {
        self.consumables.get(item_id)
    }

    pub fn failure_weights(&self, difficulty_index: u32) -> Option<&FailureWeightRow> {
        self.failure_weights.get(&difficulty_index)
    }

    pub fn stat_growth(&self, stat: StatId) -> SimResult<&StatGrowthRow> {
        self.stat_growth
            .get(&stat)
            .ok_or_else(|| SimError::MissingStatGrowth(stat.as_str().to_string()))
    }

    /// Highest defined upgrade row at or below `level` for a branch.
    pub fn rebirth_upgrade_floor(
        &self,
        branch: RebirthBranch,
        level: u32,
    ) -> Option<&RebirthUpgradeRow> {
        self.rebirth
            .get(&branch)?
            .range(..=level)
            .next_back()
            .map(|(_, row)| row)
    }

    /// Numeric combat constant. Missing keys use `fallback`; a present but
    /// non-numeric value is an error.
    pub fn constant(&self, key: &str, fallback: f64) -> SimResult<f64> {
        match self.constants.get(key) {
            None => Ok(fallback),
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(SimError::NonNumericConstant {
                    key: key.to_string(),
                    value: raw.clone(),
                }),
            },
        }
    }

    /// Localized stage name, or `world:major:sub` when no locale row exists.
    pub fn stage_display_name(&self, world: World, major: &str, sub: &str) -> String {
        self.locales
            .get(&(world, major.to_string(), sub.to_string()))
            .cloned()
            .unwrap_or_else(|| format!("{}:{}:{}", world, major, sub))
    }

    pub fn stage_row_display_name(&self, stage: &StageRow) -> String {
        self.stage_display_name(stage.world, &stage.major_stage_name, &stage.sub_stage_name)
    }
}

impl From<BalanceTables> for BalanceIndexes {
    fn from(tables: BalanceTables) -> Self {
        Self::new(tables)
    }
}

// =============================================================================
// COMBAT CONSTANTS
// =============================================================================

/// Combat constants resolved once per report instead of per hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatConstants {
    pub accuracy_floor: f64,
    pub accuracy_ceiling: f64,
    pub crit_rate_cap: f64,
    pub evasion_cap: f64,
    pub damage_reduction_cap: f64,
    pub defense_constant_k: f64,
    pub element_advantage_bonus: f64,
    pub element_disadvantage_penalty: f64,
}

impl Default for CombatConstants {
    fn default() -> Self {
        Self {
            accuracy_floor: ACCURACY_FLOOR_DEFAULT,
            accuracy_ceiling: ACCURACY_CEILING_DEFAULT,
            crit_rate_cap: CRIT_RATE_CAP_DEFAULT,
            evasion_cap: EVASION_CAP_DEFAULT,
            damage_reduction_cap: DAMAGE_REDUCTION_CAP_DEFAULT,
            defense_constant_k: DEFENSE_CONSTANT_K_DEFAULT,
            element_advantage_bonus: ELEMENT_ADVANTAGE_BONUS_DEFAULT,
            element_disadvantage_penalty: ELEMENT_DISADVANTAGE_PENALTY_DEFAULT,
        }
    }
}

impl CombatConstants {
    pub fn resolve(indexes: &BalanceIndexes) -> SimResult<Self> {
        Ok(Self {
            accuracy_floor: indexes.constant("accuracy_floor", ACCURACY_FLOOR_DEFAULT)?,
            accuracy_ceiling: indexes.constant("accuracy_ceiling", ACCURACY_CEILING_DEFAULT)?,
            crit_rate_cap: indexes.constant("crit_rate_cap", CRIT_RATE_CAP_DEFAULT)?,
            evasion_cap: indexes.constant("evasion_cap", EVASION_CAP_DEFAULT)?,
            damage_reduction_cap: indexes
                .constant("damage_reduction_cap", DAMAGE_REDUCTION_CAP_DEFAULT)?,
            defense_constant_k: indexes
                .constant("defense_constant_k", DEFENSE_CONSTANT_K_DEFAULT)?,
            element_advantage_bonus: indexes
                .constant("element_advantage_bonus", ELEMENT_ADVANTAGE_BONUS_DEFAULT)?,
            element_disadvantage_penalty: indexes.constant(
                "element_disadvantage_penalty",
                ELEMENT_DISADVANTAGE_PENALTY_DEFAULT,
            )?,
        })
    }
}

/// Serde helper for table flags stored as `0`/`1` (booleans accepted too).
mod int_flag {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        struct FlagVisitor;

        impl<'de> Visitor<'de> for FlagVisitor {
            type Value = bool;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("0, 1 or a boolean")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
                Ok(v)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
                match v {
                    0 => Ok(false),
                    1 => Ok(true),
                    other => Err(E::invalid_value(de::Unexpected::Unsigned(other), &self)),
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
                match v {
                    0 => Ok(false),
                    1 => Ok(true),
                    other => Err(E::invalid_value(de::Unexpected::Signed(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(FlagVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sample::sample_tables;

    fn indexes_with_constants(rows: &[(&str, &str)]) -> BalanceIndexes {
        let tables = BalanceTables {
            combat_constants: rows
                .iter()
                .map(|(k, v)| CombatConstantRow {
                    key: k.to_string(),
                    value: v.to_string(),
                    note: String::new(),
                })
                .collect(),
            ..Default::default()
        };
        BalanceIndexes::new(tables)
    }

    #[test]
    fn test_constant_fallback_and_parse() {
        let idx = indexes_with_constants(&[("defense_constant_k", " 200 ")]);
        assert_eq!(idx.constant("defense_constant_k", 180.0), Ok(200.0));
        assert_eq!(idx.constant("evasion_cap", 0.6), Ok(0.6));
    }

    #[test]
    fn test_non_numeric_constant_is_error() {
        let idx = indexes_with_constants(&[("crit_rate_cap", "high")]);
        let err = idx.constant("crit_rate_cap", 0.75).unwrap_err();
        assert!(matches!(err, SimError::NonNumericConstant { .. }));
        assert!(CombatConstants::resolve(&idx).is_err());
    }

    #[test]
    fn test_missing_stage_is_fatal() {
        let idx = BalanceIndexes::new(BalanceTables::default());
        assert_eq!(idx.stage(1).unwrap_err(), SimError::MissingStage(1));
    }

    #[test]
    fn test_rebirth_floor_lookup_walks_down() {
        let idx = BalanceIndexes::new(sample_tables());
        let at_4 = idx
            .rebirth_upgrade_floor(RebirthBranch::BreakthroughBonus, 4)
            .expect("level 3 row exists");
        assert_eq!(at_4.level, 3);
        assert!(idx
            .rebirth_upgrade_floor(RebirthBranch::BreakthroughBonus, 0)
            .is_none());
    }

    #[test]
    fn test_display_name_fallback_and_locale() {
        let mut tables = sample_tables();
        tables.stage_locales.push(StageLocaleRow {
            world: World::Mortal,
            major_stage_name: "qi_condensation".to_string(),
            sub_stage_name: "early".to_string(),
            display_name: "Condensing Qi I".to_string(),
        });
        let idx = BalanceIndexes::new(tables);
        assert_eq!(
            idx.stage_display_name(World::Mortal, "qi_condensation", "early"),
            "Condensing Qi I"
        );
        assert_eq!(
            idx.stage_display_name(World::Immortal, "x", "y"),
            "immortal:x:y"
        );
    }

    #[test]
    fn test_stage_row_accepts_int_flag() {
        let json = r#"{
            "difficulty_index": 7, "world": "mortal", "world_index": 1,
            "major_stage_index": 2, "major_stage_name": "m", "sub_stage_index": 2,
            "sub_stage_name": "mid", "phase": "mid", "is_tribulation": 1,
            "qi_required": 500, "base_breakthrough_success_pct": 70.0,
            "base_death_pct": 12.0, "fail_retreat_min": 1, "fail_retreat_max": 2,
            "rebirth_score_weight": 1.0, "drop_rate_multiplier": 1.0,
            "offline_reward_multiplier": 1.0
        }"#;
        let row: StageRow = serde_json::from_str(json).expect("valid stage row");
        assert!(row.is_tribulation);
        let back = serde_json::to_value(&row).expect("serializes");
        assert_eq!(back["is_tribulation"], 1);
    }

    #[test]
    fn test_skill_and_monster_lookup_preserve_table_order() {
        let idx = BalanceIndexes::new(sample_tables());
        assert!(idx.skill("sk_atk_001").is_some());
        assert!(idx.monster("mob_m_008").is_some());
        assert!(idx.monster("does_not_exist").is_none());
        let first = &idx.monsters()[0];
        assert_eq!(idx.monster(&first.monster_id), Some(first));
    }
}
