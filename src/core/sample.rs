//! Built-in balance set and starter save.
//!
//! A compact ladder (six mortal majors, two immortal majors, five sub-stages
//! each, the fifth being a tribulation) with enough skills, monsters and
//! consumables to exercise every engine path. The binary falls back to it
//! when no table file is given; tests lean on it heavily.

use super::balance::{
    BalanceTables, CombatConstantRow, ConsumableRow, FailureWeightRow, ItemType, MonsterRow, MonsterType, Phase,
    RebirthUpgradeRow, SkillCategory, SkillRow, StageLocaleRow, StageRow, StatGrowthRow, UpgradeEffectType, World,
};
use super::combat_math::round_to;
use crate::character::derived_stats::StatId;
use crate::character::rebirth::RebirthBranch;
use crate::character::save::{
    SaveCurrencies, SaveInventory, SaveInventoryItem, SaveMaterialItem, SavePityCounters, SaveProgression, SaveSettings,
    SaveTimestamps, SaveV2, SAVE_V2_VERSION,
};
use serde_json::{json, Map};

/// 2026-01-01T00:00:00Z.
pub const SAMPLE_EPOCH_MS: u64 = 1_767_225_600_000;

const MORTAL_MAJORS: [&str; 6] = [
    "qi_condensation",
    "foundation_establishment",
    "core_formation",
    "nascent_soul",
    "spirit_severing",
    "void_refining",
];
const IMMORTAL_MAJORS: [&str; 2] = ["earthly_immortal", "heavenly_immortal"];
const SUB_STAGES: [(&str, Phase); 5] = [
    ("early", Phase::Early),
    ("mid", Phase::Mid),
    ("late", Phase::Late),
    ("perfect", Phase::Perfect),
    ("transcendent", Phase::Transcendent),
];
const SUB_PENALTY_MORTAL: [f64; 5] = [0.0, 2.0, 4.0, 8.0, 14.0];
const SUB_PENALTY_IMMORTAL: [f64; 5] = [0.0, 3.0, 7.0, 13.0, 22.0];

fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn stage_rows() -> Vec<StageRow> {
    let mut rows = Vec::new();
    let mut difficulty = 1;
    let worlds: [(World, &[&str], f64, f64); 2] = [
        (World::Mortal, &MORTAL_MAJORS, 100.0, 1.22),
        (World::Immortal, &IMMORTAL_MAJORS, 450_000.0, 1.2),
    ];

    for (world, majors, start_qi, growth) in worlds {
        for (m, major) in majors.iter().enumerate() {
            let major_idx = m as u32 + 1;
            for (s, (sub, phase)) in SUB_STAGES.iter().enumerate() {
                let sub_idx = s as u32 + 1;
                let local = (m * SUB_STAGES.len() + s) as i32;
                let is_tribulation = sub_idx == SUB_STAGES.len() as u32;
                let (base_success, base_death) = match world {
                    World::Mortal => {
                        let success = (92.0 - f64::from(major_idx - 1) * 3.0 - SUB_PENALTY_MORTAL[s]).clamp(22.0, 95.0);
                        (success, 3.0 + f64::from(major_idx - 1) * 4.0)
                    }
                    _ => {
                        let success = (78.0 - f64::from(major_idx - 1) * 4.0 - SUB_PENALTY_IMMORTAL[s]).clamp(12.0, 90.0);
                        (success, 12.0 + f64::from(major_idx - 1) * 5.0)
                    }
                };
                rows.push(StageRow {
                    difficulty_index: difficulty,
                    world,
                    world_index: world.order(),
                    major_stage_index: major_idx,
                    major_stage_name: major.to_string(),
                    sub_stage_index: sub_idx,
                    sub_stage_name: sub.to_string(),
                    phase: *phase,
                    is_tribulation,
                    qi_required: (start_qi * growth.powi(local)).round() as u64,
                    base_breakthrough_success_pct: base_success,
                    base_death_pct: if is_tribulation { base_death } else { 0.0 },
                    fail_retreat_min: u32::from(is_tribulation),
                    fail_retreat_max: if is_tribulation { 2 } else { 0 },
                    rebirth_score_weight: round_to(1.0 + f64::from(major_idx) * 0.35 + f64::from(sub_idx) * 0.04, 2),
                    drop_rate_multiplier: round_to(1.0 + f64::from(difficulty) * 0.012, 3),
                    offline_reward_multiplier: round_to(1.0 + f64::from(difficulty) * 0.01, 3),
                });
                difficulty += 1;
            }
        }
    }
    rows
}

/// Failure splits for the mortal tribulations. Immortal tribulations are
/// left without a row and use the fallback split.
fn failure_weight_rows(stages: &[StageRow]) -> Vec<FailureWeightRow> {
    stages
        .iter()
        .filter(|s| s.is_tribulation && s.world == World::Mortal)
        .map(|s| {
            let death = s.base_death_pct.clamp(2.0, 90.0).floor();
            let remaining = 100.0 - death;
            let ratio = (0.52 + f64::from(s.world_index - 1) * 0.07).clamp(0.12, 0.75);
            let retreat = (remaining * ratio).round();
            FailureWeightRow {
                difficulty_index: s.difficulty_index,
                weight_minor_fail: remaining - retreat,
                weight_retreat_fail: retreat,
                weight_death_fail: death,
                retreat_min_layers: Some(f64::from(s.fail_retreat_min)),
                retreat_max_layers: Some(f64::from(s.fail_retreat_max)),
            }
        })
        .collect()
}

fn locale_rows(stages: &[StageRow]) -> Vec<StageLocaleRow> {
    stages
        .iter()
        .map(|s| StageLocaleRow {
            world: s.world,
            major_stage_name: s.major_stage_name.clone(),
            sub_stage_name: s.sub_stage_name.clone(),
            display_name: format!("{} ({})", title_case(&s.major_stage_name), title_case(&s.sub_stage_name)),
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn skill(
    id: &str,
    name: &str,
    world: World,
    unlock: u32,
    coeff: f64,
    cooldown: f64,
    cost: f64,
    element: &str,
    status: (&str, f64, f64),
) -> SkillRow {
    SkillRow {
        skill_id: id.to_string(),
        name: name.to_string(),
        category: SkillCategory::Active,
        world_unlock: world,
        unlock_difficulty_index: unlock,
        cost_mp: cost,
        cooldown_sec: cooldown,
        damage_coeff: coeff,
        element: element.to_string(),
        status_effect: status.0.to_string(),
        status_chance_pct: status.1,
        status_duration_sec: status.2,
    }
}

fn skill_rows() -> Vec<SkillRow> {
    use World::*;
    vec![
        skill("sk_atk_001", "Flame Palm", Mortal, 1, 1.35, 3.0, 12.0, "fire", ("burn", 25.0, 3.0)),
        skill("sk_atk_002", "Frost Needle", Mortal, 1, 1.2, 2.5, 10.0, "ice", ("slow", 20.0, 2.0)),
        skill("sk_atk_003", "Thunder Seal", Mortal, 8, 1.8, 5.0, 20.0, "thunder", ("stun", 12.0, 1.0)),
        skill("sk_atk_004", "Gale Blade", Mortal, 14, 1.6, 4.0, 16.0, "wind", ("weaken", 18.0, 3.0)),
        skill("sk_atk_005", "Mountain Crush", Mortal, 22, 2.2, 7.0, 28.0, "earth", ("armor_break", 20.0, 4.0)),
        skill("sk_imm_001", "Heavenly Sword", Immortal, 31, 2.8, 6.0, 30.0, "metal", ("", 0.0, 0.0)),
        SkillRow {
            category: SkillCategory::Passive,
            ..skill("sk_pas_001", "Iron Body", Mortal, 1, 0.0, 0.0, 0.0, "", ("", 0.0, 0.0))
        },
    ]
}

#[allow(clippy::too_many_arguments)]
fn monster(
    id: &str,
    name: &str,
    world: World,
    kind: MonsterType,
    element: &str,
    mults: [f64; 4],
    crit_evasion: (f64, f64),
    essence: f64,
    mechanic: &str,
) -> MonsterRow {
    MonsterRow {
        monster_id: id.to_string(),
        name: name.to_string(),
        world,
        monster_type: kind,
        element: element.to_string(),
        hp_mult: Some(mults[0]),
        atk_mult: Some(mults[1]),
        def_mult: Some(mults[2]),
        speed_mult: Some(mults[3]),
        crit_rate: Some(crit_evasion.0),
        evasion: Some(crit_evasion.1),
        rebirth_essence_drop: Some(essence),
        special_mechanic: mechanic.to_string(),
    }
}

fn monster_rows() -> Vec<MonsterRow> {
    use MonsterType::*;
    use World::*;
    vec![
        monster("mob_m_001", "Wild Boar", Mortal, Normal, "earth", [0.9, 0.8, 0.8, 0.95], (0.03, 0.02), 0.0, ""),
        monster("mob_m_002", "Ember Fox", Mortal, Normal, "fire", [0.85, 0.9, 0.7, 1.15], (0.05, 0.06), 0.0, "burn_claw"),
        monster("mob_m_003", "Frost Wolf", Mortal, Elite, "ice", [1.3, 1.05, 1.0, 1.05], (0.06, 0.05), 1.0, "slow_aura"),
        monster("mob_m_004", "Stone Golem", Mortal, Normal, "earth", [1.2, 0.75, 1.4, 0.8], (0.02, 0.0), 0.0, "high_def"),
        monster("mob_m_005", "Thunder Hawk", Mortal, Normal, "thunder", [0.8, 1.0, 0.7, 1.3], (0.08, 0.1), 0.0, "blink_strike"),
        monster("mob_m_006", "Venom Serpent", Mortal, Elite, "wood", [1.1, 1.1, 0.9, 1.1], (0.05, 0.06), 1.0, "poison_stack"),
        monster("mob_m_007", "Shadow Panther", Mortal, Elite, "wind", [1.0, 1.2, 0.9, 1.25], (0.1, 0.08), 2.0, "high_crit"),
        monster("mob_m_008", "Flame Tyrant", Mortal, Boss, "fire", [2.2, 1.25, 1.2, 0.95], (0.08, 0.04), 5.0, "burn_field"),
        monster("mob_i_001", "Cloud Serpent", Immortal, Normal, "wind", [1.0, 1.0, 1.0, 1.1], (0.06, 0.08), 2.0, "chain_lightning"),
        monster("mob_i_002", "Jade Guardian", Immortal, Elite, "earth", [1.5, 1.1, 1.4, 0.9], (0.05, 0.03), 4.0, "law_barrier"),
        monster("mob_i_003", "Celestial Judge", Immortal, Boss, "thunder", [2.6, 1.35, 1.3, 1.0], (0.1, 0.05), 10.0, "judgment_mark"),
        monster("mob_t_001", "Origin Devourer", True, Boss, "metal", [3.0, 1.5, 1.5, 1.05], (0.12, 0.06), 25.0, "soul_harvest"),
    ]
}

/// Sparse upgrade levels: lookups for the gaps walk down to the row below.
const REBIRTH_LEVELS: [u32; 7] = [1, 2, 3, 5, 8, 12, 20];

fn rebirth_rows() -> Vec<RebirthUpgradeRow> {
    let branches = [
        (RebirthBranch::CultivationSpeed, UpgradeEffectType::MulPct, 0.04, 0.01, 1.17),
        (RebirthBranch::BreakthroughBonus, UpgradeEffectType::FlatPct, 0.8, 0.15, 1.19),
        (RebirthBranch::TribulationGuard, UpgradeEffectType::FlatPct, 0.9, 0.2, 1.21),
        (RebirthBranch::PotionMastery, UpgradeEffectType::MulPct, 0.03, 0.007, 1.18),
        (RebirthBranch::OfflineEfficiency, UpgradeEffectType::MulPct, 0.05, 0.01, 1.16),
    ];
    let mut rows = Vec::new();
    for (branch, effect_type, base, per_level, growth) in branches {
        for level in REBIRTH_LEVELS {
            let step = f64::from(level - 1);
            rows.push(RebirthUpgradeRow {
                branch,
                level,
                cost_rebirth_essence: (20.0 * f64::powf(growth, step)).round() as u64,
                effect_type,
                effect_value: round_to(base + step * per_level, 4),
            });
        }
    }
    rows
}

fn consumable(id: &str, item_type: ItemType, name: &str, effect_type: &str, value: &str) -> ConsumableRow {
    ConsumableRow {
        item_id: id.to_string(),
        item_type,
        name: name.to_string(),
        effect_type: effect_type.to_string(),
        effect_value: value.to_string(),
    }
}

fn consumable_rows() -> Vec<ConsumableRow> {
    vec![
        consumable("pill_bt_001", ItemType::Potion, "Foundation Pill", "breakthrough_bonus_flat_pct", "5"),
        consumable("pill_bt_002", ItemType::Potion, "Heaven Pill", "breakthrough_bonus_flat_pct", "10"),
        consumable("tal_guard_001", ItemType::Talisman, "Thunder Ward Talisman", "tribulation_death_reduce_flat_pct", "4"),
        consumable("pill_rebirth_001", ItemType::Potion, "Reincarnation Pill", "rebirth_essence_mul_pct", "0.25"),
        consumable("tal_luck_001", ItemType::Talisman, "Fortune Charm", "drop_rate_mul_pct", "0.1"),
    ]
}

fn stat_rows() -> Vec<StatGrowthRow> {
    // (stat, base, per level, per major, per sub, rebirth %, hard cap, soft cap, slope)
    let table: [(StatId, f64, f64, f64, f64, f64, f64, f64, f64); 11] = [
        (StatId::Hp, 120.0, 18.0, 90.0, 12.0, 4.0, -1.0, -1.0, 0.0),
        (StatId::Mp, 60.0, 2.5, 8.0, 1.5, 2.0, -1.0, -1.0, 0.0),
        (StatId::Atk, 18.0, 2.6, 12.0, 1.6, 4.0, -1.0, -1.0, 0.0),
        (StatId::Def, 9.0, 1.3, 7.0, 0.9, 3.0, -1.0, -1.0, 0.0),
        (StatId::Speed, 1.0, 0.004, 0.03, 0.005, 0.5, 2.5, 1.8, 0.5),
        (StatId::Accuracy, 0.8, 0.0015, 0.01, 0.001, 0.0, 0.98, 0.92, 0.5),
        (StatId::Evasion, 0.05, 0.0008, 0.006, 0.0005, 0.0, 0.6, 0.35, 0.5),
        (StatId::CritRate, 0.05, 0.001, 0.008, 0.0006, 0.0, 0.75, 0.4, 0.5),
        (StatId::CritDamage, 0.5, 0.004, 0.03, 0.002, 1.0, 3.0, 1.5, 0.5),
        (StatId::Penetration, 0.02, 0.0008, 0.01, 0.0008, 0.0, 0.65, 0.4, 0.5),
        (StatId::DamageReduction, 0.02, 0.0006, 0.008, 0.0005, 0.0, 0.7, 0.4, 0.5),
    ];
    table
        .iter()
        .map(|&(stat_id, base, lvl, major, sub, rebirth, hard, soft, slope)| StatGrowthRow {
            stat_id,
            base_value: base,
            per_player_level: lvl,
            per_major_stage: major,
            per_sub_stage: sub,
            rebirth_scale_pct: rebirth,
            hard_cap: hard,
            soft_cap_start: soft,
            soft_cap_slope: slope,
        })
        .collect()
}

fn constant_rows() -> Vec<CombatConstantRow> {
    [
        ("defense_constant_k", "180", "used in defense/(defense+K)"),
        ("accuracy_floor", "0.55", "minimum hit chance"),
        ("accuracy_ceiling", "0.98", "maximum hit chance"),
        ("crit_rate_cap", "0.75", "hard cap"),
        ("evasion_cap", "0.60", "hard cap"),
        ("damage_reduction_cap", "0.70", "hard cap"),
        ("element_advantage_bonus", "0.25", "elemental damage bonus"),
        ("element_disadvantage_penalty", "-0.20", "elemental damage penalty"),
        ("offline_reward_hours_cap", "12", "max offline accumulation"),
        ("auto_rebirth_unlock_stage", "mortal:4", "unlock requirement"),
    ]
    .iter()
    .map(|(key, value, note)| CombatConstantRow {
        key: key.to_string(),
        value: value.to_string(),
        note: note.to_string(),
    })
    .collect()
}

/// The full built-in balance set.
pub fn sample_tables() -> BalanceTables {
    let progression = stage_rows();
    BalanceTables {
        failure_weights: failure_weight_rows(&progression),
        stage_locales: locale_rows(&progression),
        progression,
        skills: skill_rows(),
        monsters: monster_rows(),
        rebirth_upgrades: rebirth_rows(),
        consumables: consumable_rows(),
        stat_growth: stat_rows(),
        combat_constants: constant_rows(),
    }
}

/// A fresh cultivator at the first stage with an empty qi bar.
pub fn sample_save() -> SaveV2 {
    let mut extra = Map::new();
    extra.insert(
        "player".to_string(),
        json!({"id": "player_01", "name": "Cultivator", "created_at": "2026-01-01T00:00:00Z"}),
    );
    SaveV2 {
        version: SAVE_V2_VERSION,
        progression: SaveProgression {
            difficulty_index: 1,
            world: World::Mortal,
            major_stage_name: MORTAL_MAJORS[0].to_string(),
            sub_stage_name: SUB_STAGES[0].0.to_string(),
            rebirth_count: 0,
            unlocked_nodes: Vec::new(),
        },
        currencies: SaveCurrencies::default(),
        inventory: SaveInventory {
            items: vec![
                SaveInventoryItem { item_id: "pill_bt_001".to_string(), quantity: 3, locked: None },
                SaveInventoryItem { item_id: "tal_guard_001".to_string(), quantity: 1, locked: None },
            ],
            materials: vec![SaveMaterialItem { material_id: "mat_spirit_herb".to_string(), quantity: 5 }],
        },
        settings: SaveSettings::default(),
        timestamps: SaveTimestamps {
            last_login_epoch_ms: SAMPLE_EPOCH_MS,
            save_epoch_ms: SAMPLE_EPOCH_MS,
        },
        pity_counters: SavePityCounters::default(),
        extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::balance::BalanceIndexes;

    #[test]
    fn test_ladder_shape() {
        let tables = sample_tables();
        assert_eq!(tables.progression.len(), 40);
        let idx = BalanceIndexes::new(tables);
        let first = idx.stage(1).expect("stage 1");
        assert_eq!(first.qi_required, 100);
        assert_eq!(first.phase, Phase::Early);
        assert!(!idx.stage(2).expect("stage 2").is_tribulation);
        for i in (5..=40).step_by(5) {
            assert!(idx.stage(i).expect("stage").is_tribulation, "stage {} is a tribulation", i);
        }
        assert_eq!(idx.stage(31).expect("stage").world, World::Immortal);
    }

    #[test]
    fn test_failure_weights_cover_mortal_tribulations_only() {
        let idx = BalanceIndexes::new(sample_tables());
        for i in [5, 10, 15, 20, 25, 30] {
            let row = idx.failure_weights(i).expect("weights");
            assert!(row.weight_retreat_fail > 0.0 && row.weight_minor_fail > 0.0);
        }
        assert!(idx.failure_weights(35).is_none());
    }

    #[test]
    fn test_sample_save_round_trips() {
        let save = sample_save();
        let again = SaveV2::from_json(&save.to_json_pretty().expect("json")).expect("parse");
        assert_eq!(save, again);
        assert_eq!(save.inventory.quantity("pill_bt_001"), 3);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("qi_condensation"), "Qi Condensation");
        assert_eq!(title_case("early"), "Early");
    }
}
