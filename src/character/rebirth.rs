use crate::core::balance::{BalanceIndexes, StageRow};
use crate::core::combat_math::{clamp, round_half_up, round_to};
use crate::core::constants::*;
use crate::progression::tribulation::ConsumableContribution;
use serde::{Deserialize, Serialize};

/// Permanent upgrade branches bought with rebirth essence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebirthBranch {
    CultivationSpeed,
    BreakthroughBonus,
    TribulationGuard,
    PotionMastery,
    OfflineEfficiency,
}

/// Effect value of the highest defined upgrade row at or below `level`.
///
/// Upgrade tables are sparse, so level 4 may resolve to the level 3 row.
/// Level 0, or a branch with no row at or below `level`, yields 0.
pub fn resolve_rebirth_bonus(indexes: &BalanceIndexes, branch: RebirthBranch, level: u32) -> f64 {
    if level == 0 {
        return 0.0;
    }
    indexes
        .rebirth_upgrade_floor(branch, level)
        .map(|row| row.effect_value)
        .unwrap_or(0.0)
}

/// `floor(rebirth_count / divisor)` capped at the max upgrade level.
pub fn infer_rebirth_level(rebirth_count: u32, divisor: u32) -> u32 {
    (rebirth_count / divisor.max(1)).min(REBIRTH_LEVEL_CAP)
}

/// Upgrade levels consulted by a breakthrough attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebirthLevels {
    pub breakthrough_bonus: u32,
    pub tribulation_guard: u32,
    pub potion_mastery: u32,
}

impl RebirthLevels {
    /// Levels a save is assumed to own given only its rebirth count.
    pub fn inferred(rebirth_count: u32) -> Self {
        Self {
            breakthrough_bonus: infer_rebirth_level(rebirth_count, 3),
            tribulation_guard: infer_rebirth_level(rebirth_count, 4),
            potion_mastery: infer_rebirth_level(rebirth_count, 5),
        }
    }

    pub fn capped(self) -> Self {
        Self {
            breakthrough_bonus: self.breakthrough_bonus.min(REBIRTH_LEVEL_CAP),
            tribulation_guard: self.tribulation_guard.min(REBIRTH_LEVEL_CAP),
            potion_mastery: self.potion_mastery.min(REBIRTH_LEVEL_CAP),
        }
    }
}

/// Explicit per-branch levels; unset branches fall back to inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebirthLevelOverrides {
    pub breakthrough_bonus: Option<u32>,
    pub tribulation_guard: Option<u32>,
    pub potion_mastery: Option<u32>,
}

impl RebirthLevelOverrides {
    pub fn is_empty(&self) -> bool {
        self.breakthrough_bonus.is_none()
            && self.tribulation_guard.is_none()
            && self.potion_mastery.is_none()
    }

    /// Merge overrides over `fallback`, capping every level.
    pub fn resolve(&self, fallback: RebirthLevels) -> RebirthLevels {
        RebirthLevels {
            breakthrough_bonus: self.breakthrough_bonus.unwrap_or(fallback.breakthrough_bonus),
            tribulation_guard: self.tribulation_guard.unwrap_or(fallback.tribulation_guard),
            potion_mastery: self.potion_mastery.unwrap_or(fallback.potion_mastery),
        }
        .capped()
    }
}

/// What happens to a save when a tribulation kills the cultivator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RebirthOnDeathConfig {
    pub enabled: bool,
    pub reset_difficulty_index: u32,
    pub reset_qi: bool,
    pub reset_spirit_coin: bool,
    pub clear_unlocked_nodes: bool,
    pub reward_weight_scale: f64,
    pub reward_difficulty_scale: f64,
    pub reward_rebirth_count_scale_pct: f64,
    pub reward_min: u64,
    pub reward_max: u64,
}

impl Default for RebirthOnDeathConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reset_difficulty_index: 1,
            reset_qi: true,
            reset_spirit_coin: true,
            clear_unlocked_nodes: false,
            reward_weight_scale: REBIRTH_REWARD_WEIGHT_SCALE,
            reward_difficulty_scale: REBIRTH_REWARD_DIFFICULTY_SCALE,
            reward_rebirth_count_scale_pct: REBIRTH_REWARD_COUNT_SCALE_PCT,
            reward_min: REBIRTH_REWARD_MIN,
            reward_max: REBIRTH_REWARD_MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EssenceSource {
    pub item_id: String,
    pub effect_type: String,
    pub applied_value: f64,
}

/// Essence paid out on rebirth, with every factor reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EssenceReward {
    pub base_essence: f64,
    pub rebirth_scale_multiplier: f64,
    pub consumable_multiplier: f64,
    pub final_essence: u64,
    pub applied_effect_sources: Vec<EssenceSource>,
}

impl EssenceReward {
    /// Reward reported when rebirth settlement is disabled.
    pub fn none() -> Self {
        Self {
            base_essence: 0.0,
            rebirth_scale_multiplier: 1.0,
            consumable_multiplier: 1.0,
            final_essence: 0,
            applied_effect_sources: Vec::new(),
        }
    }
}

/// Rebirth essence for dying at `stage`.
///
/// `(weight * 12 + sqrt(idx) * 0.85) * (1 + pre * 1.5%) * (1 + essence consumables)`,
/// rounded and clamped to `[reward_min, reward_max]`.
pub fn calc_rebirth_essence_reward(
    stage: &StageRow,
    pre_rebirth_count: u32,
    contributions: &[ConsumableContribution],
    config: &RebirthOnDeathConfig,
) -> EssenceReward {
    let applied_effect_sources: Vec<EssenceSource> = contributions
        .iter()
        .filter(|c| c.effect_type == EFFECT_REBIRTH_ESSENCE_MUL)
        .map(|c| EssenceSource {
            item_id: c.item_id.clone(),
            effect_type: c.effect_type.clone(),
            applied_value: c.applied_value.max(0.0),
        })
        .collect();
    let consumable_multiplier =
        1.0 + applied_effect_sources.iter().map(|s| s.applied_value).sum::<f64>();

    let base_essence = stage.rebirth_score_weight * config.reward_weight_scale
        + f64::from(stage.difficulty_index).sqrt() * config.reward_difficulty_scale;
    let rebirth_scale_multiplier =
        1.0 + f64::from(pre_rebirth_count) * (config.reward_rebirth_count_scale_pct / 100.0);

    let raw = base_essence * rebirth_scale_multiplier * consumable_multiplier;
    let min = config.reward_min as f64;
    let max = config.reward_max.max(config.reward_min) as f64;
    let final_essence = clamp(round_half_up(raw), min, max) as u64;

    EssenceReward {
        base_essence: round_to(base_essence, 4),
        rebirth_scale_multiplier: round_to(rebirth_scale_multiplier, 4),
        consumable_multiplier: round_to(consumable_multiplier, 4),
        final_essence,
        applied_effect_sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::balance::ItemType;
    use crate::core::sample::sample_tables;

    fn stage(idx: u32, weight: f64) -> StageRow {
        let indexes = BalanceIndexes::new(sample_tables());
        let mut row = indexes.stage(idx).expect("sample stage").clone();
        row.rebirth_score_weight = weight;
        row
    }

    fn essence_pill(value: f64) -> ConsumableContribution {
        ConsumableContribution {
            item_id: "pill_rebirth_001".to_string(),
            name: "Reincarnation Pill".to_string(),
            item_type: ItemType::Potion,
            effect_type: EFFECT_REBIRTH_ESSENCE_MUL.to_string(),
            base_value: value,
            applied_value: value,
        }
    }

    #[test]
    fn test_resolve_bonus_walks_down_sparse_levels() {
        let indexes = BalanceIndexes::new(sample_tables());
        let lv3 = resolve_rebirth_bonus(&indexes, RebirthBranch::BreakthroughBonus, 3);
        let lv4 = resolve_rebirth_bonus(&indexes, RebirthBranch::BreakthroughBonus, 4);
        assert!(lv3 > 0.0);
        assert_eq!(lv3, lv4, "level 4 is undefined and must use level 3");
        assert_eq!(resolve_rebirth_bonus(&indexes, RebirthBranch::BreakthroughBonus, 0), 0.0);
    }

    #[test]
    fn test_resolve_bonus_beyond_table_uses_top_row() {
        let indexes = BalanceIndexes::new(sample_tables());
        let top = resolve_rebirth_bonus(&indexes, RebirthBranch::TribulationGuard, 20);
        assert_eq!(resolve_rebirth_bonus(&indexes, RebirthBranch::TribulationGuard, 999), top);
    }

    #[test]
    fn test_inferred_levels() {
        let levels = RebirthLevels::inferred(12);
        assert_eq!(levels.breakthrough_bonus, 4);
        assert_eq!(levels.tribulation_guard, 3);
        assert_eq!(levels.potion_mastery, 2);
        assert_eq!(RebirthLevels::inferred(10_000).breakthrough_bonus, REBIRTH_LEVEL_CAP);
    }

    #[test]
    fn test_overrides_merge_and_cap() {
        let overrides = RebirthLevelOverrides {
            breakthrough_bonus: Some(50),
            tribulation_guard: None,
            potion_mastery: Some(1),
        };
        let merged = overrides.resolve(RebirthLevels::inferred(8));
        assert_eq!(merged.breakthrough_bonus, REBIRTH_LEVEL_CAP);
        assert_eq!(merged.tribulation_guard, 2);
        assert_eq!(merged.potion_mastery, 1);
    }

    #[test]
    fn test_essence_reward_formula() {
        let row = stage(16, 3.0);
        let config = RebirthOnDeathConfig::default();
        // (3 * 12 + 4 * 0.85) * (1 + 2 * 0.015) = 39.4 * 1.03 = 40.582
        let reward = calc_rebirth_essence_reward(&row, 2, &[], &config);
        assert_eq!(reward.final_essence, 41);
        assert_eq!(reward.base_essence, 39.4);
        assert_eq!(reward.rebirth_scale_multiplier, 1.03);
        assert_eq!(reward.consumable_multiplier, 1.0);
    }

    #[test]
    fn test_essence_reward_consumables_and_clamp() {
        let row = stage(16, 3.0);
        let config = RebirthOnDeathConfig::default();
        let boosted = calc_rebirth_essence_reward(&row, 0, &[essence_pill(0.5)], &config);
        assert_eq!(boosted.consumable_multiplier, 1.5);
        assert_eq!(boosted.applied_effect_sources.len(), 1);
        assert_eq!(boosted.final_essence, 59); // 39.4 * 1.5 = 59.1

        let tiny = calc_rebirth_essence_reward(&stage(1, 0.0), 0, &[], &config);
        assert_eq!(tiny.final_essence, REBIRTH_REWARD_MIN);

        let capped = RebirthOnDeathConfig {
            reward_max: 10,
            ..Default::default()
        };
        assert_eq!(calc_rebirth_essence_reward(&row, 0, &[], &capped).final_essence, 10);
    }
}
