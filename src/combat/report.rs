//! Multi-duel combat report: one player loadout against a small monster roster.

use super::logic::{simulate_duel, DuelOptions};
use super::types::{CombatSkill, DuelResult, Side};
use crate::character::derived_stats::{derive_monster_stats, derive_unit_stats, CombatUnitStats};
use crate::core::balance::{
    BalanceIndexes, CombatConstants, MonsterRow, MonsterType, SkillCategory, StageRow, World,
};
use crate::core::combat_math::round_to;
use crate::core::constants::*;
use crate::core::error::{SimError, SimResult};
use crate::core::rng::{derive_seed, DEFAULT_SEED};
use serde::{Deserialize, Serialize};

pub const REPORT_SKILL_SLOTS: usize = 2;
pub const REPORT_MONSTER_SLOTS: usize = 3;

/// Inputs of a combat report. The default is the reference scenario used by
/// the regression fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CombatReportConfig {
    pub difficulty_index: u32,
    pub player_level: u32,
    pub rebirth_count: u32,
    pub rng_seed: u32,
    pub skill_ids: Vec<String>,
    pub monster_ids: Vec<String>,
    pub max_turns_per_battle: u32,
    pub include_action_logs: bool,
}

impl Default for CombatReportConfig {
    fn default() -> Self {
        Self {
            difficulty_index: 20,
            player_level: 30,
            rebirth_count: 2,
            rng_seed: DEFAULT_SEED,
            skill_ids: vec!["sk_atk_001".to_string(), "sk_atk_002".to_string()],
            monster_ids: vec![
                "mob_m_001".to_string(),
                "mob_m_003".to_string(),
                "mob_m_008".to_string(),
            ],
            max_turns_per_battle: DEFAULT_MAX_TURNS_PER_BATTLE,
            include_action_logs: true,
        }
    }
}

impl CombatReportConfig {
    /// High-volume preset: same scenario, no action logs.
    pub fn quiet() -> Self {
        Self {
            include_action_logs: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatContext {
    pub world: World,
    pub major_stage_name: String,
    pub sub_stage_name: String,
    pub defense_constant_k: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLoadout {
    pub stats: CombatUnitStats,
    pub skills: Vec<CombatSkill>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatSummary {
    pub total: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub avg_turns: f64,
    pub avg_elapsed_sec: f64,
}

impl CombatSummary {
    fn from_duels(duels: &[DuelResult]) -> Self {
        let total = duels.len() as u32;
        let wins = duels.iter().filter(|d| d.winner == Side::Player).count() as u32;
        let n = f64::from(total.max(1));
        let avg_turns = duels.iter().map(|d| f64::from(d.turns)).sum::<f64>() / n;
        let avg_elapsed = duels.iter().map(|d| d.elapsed_sec).sum::<f64>() / n;
        Self {
            total,
            wins,
            losses: total - wins,
            win_rate: f64::from(wins) / n,
            avg_turns: round_to(avg_turns, 2),
            avg_elapsed_sec: round_to(avg_elapsed, 3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatReport {
    pub config: CombatReportConfig,
    pub context: CombatContext,
    pub player: PlayerLoadout,
    pub duels: Vec<DuelResult>,
    pub summary: CombatSummary,
}

/// Pick the report's skill loadout.
///
/// Requested ids that name active skills with a positive coefficient win when
/// at least two resolve. Otherwise the two earliest-unlocking mortal active
/// skills at or below `difficulty_index` are used.
///
/// # Errors
/// `SkillSelection` when fewer than two skills qualify either way.
pub fn select_skills(
    indexes: &BalanceIndexes,
    skill_ids: &[String],
    difficulty_index: u32,
) -> SimResult<Vec<CombatSkill>> {
    let usable = |category: SkillCategory, coeff: f64| category == SkillCategory::Active && coeff > 0.0;

    let requested: Vec<CombatSkill> = skill_ids
        .iter()
        .filter_map(|id| indexes.skill(id))
        .filter(|row| usable(row.category, row.damage_coeff))
        .map(CombatSkill::from_row)
        .collect();
    if requested.len() >= REPORT_SKILL_SLOTS {
        return Ok(requested.into_iter().take(REPORT_SKILL_SLOTS).collect());
    }

    let mut fallback: Vec<_> = indexes
        .skills()
        .iter()
        .filter(|row| {
            usable(row.category, row.damage_coeff)
                && row.world_unlock == World::Mortal
                && row.unlock_difficulty_index <= difficulty_index
        })
        .collect();
    // stable: equal unlocks keep table order
    fallback.sort_by_key(|row| row.unlock_difficulty_index);
    if fallback.len() < REPORT_SKILL_SLOTS {
        return Err(SimError::SkillSelection {
            needed: REPORT_SKILL_SLOTS,
        });
    }
    Ok(fallback
        .into_iter()
        .take(REPORT_SKILL_SLOTS)
        .map(CombatSkill::from_row)
        .collect())
}

/// Pick the report's monster roster: the first three requested ids that
/// resolve, or the first mortal normal, elite and boss rows.
pub fn select_monsters<'a>(
    indexes: &'a BalanceIndexes,
    monster_ids: &[String],
) -> SimResult<Vec<&'a MonsterRow>> {
    let picked: Vec<&MonsterRow> = monster_ids.iter().filter_map(|id| indexes.monster(id)).collect();
    if picked.len() >= REPORT_MONSTER_SLOTS {
        return Ok(picked.into_iter().take(REPORT_MONSTER_SLOTS).collect());
    }

    MonsterType::ALL
        .iter()
        .map(|&kind| {
            indexes
                .monsters()
                .iter()
                .find(|m| m.world == World::Mortal && m.monster_type == kind)
                .ok_or(SimError::MissingFallbackMonster(kind))
        })
        .collect()
}

/// Player stats for a stage row, level and rebirth count.
pub fn player_stats_for_stage(
    indexes: &BalanceIndexes,
    constants: &CombatConstants,
    stage: &StageRow,
    player_level: u32,
    rebirth_count: u32,
) -> SimResult<CombatUnitStats> {
    derive_unit_stats(
        indexes,
        constants,
        player_level,
        stage.major_stage_index,
        stage.sub_stage_index,
        rebirth_count,
    )
}

/// Run the full report: one duel per selected monster, seeded
/// `rng_seed + idx * 1009`.
pub fn run_combat_report(indexes: &BalanceIndexes, config: &CombatReportConfig) -> SimResult<CombatReport> {
    let stage = indexes.stage(config.difficulty_index)?;
    let constants = CombatConstants::resolve(indexes)?;
    let skills = select_skills(indexes, &config.skill_ids, config.difficulty_index)?;
    let monsters = select_monsters(indexes, &config.monster_ids)?;
    let player = player_stats_for_stage(indexes, &constants, stage, config.player_level, config.rebirth_count)?;

    let duels: Vec<DuelResult> = monsters
        .iter()
        .enumerate()
        .map(|(idx, monster)| {
            let monster_stats = derive_monster_stats(&player, monster, &constants);
            let options = DuelOptions {
                seed: derive_seed(config.rng_seed, idx as u64),
                max_turns: config.max_turns_per_battle,
                include_logs: config.include_action_logs,
            };
            simulate_duel(&player, monster, &monster_stats, &skills, &options, &constants)
        })
        .collect();

    let summary = CombatSummary::from_duels(&duels);
    Ok(CombatReport {
        config: config.clone(),
        context: CombatContext {
            world: stage.world,
            major_stage_name: stage.major_stage_name.clone(),
            sub_stage_name: stage.sub_stage_name.clone(),
            defense_constant_k: constants.defense_constant_k,
        },
        player: PlayerLoadout { stats: player, skills },
        duels,
        summary,
    })
}

/// Single duel against a specific monster with the report's stat and skill
/// rules. `monster_ids` in `config` is ignored.
pub fn run_duel_against(
    indexes: &BalanceIndexes,
    config: &CombatReportConfig,
    monster: &MonsterRow,
) -> SimResult<DuelResult> {
    let stage = indexes.stage(config.difficulty_index)?;
    let constants = CombatConstants::resolve(indexes)?;
    let skills = select_skills(indexes, &config.skill_ids, config.difficulty_index)?;
    let player = player_stats_for_stage(indexes, &constants, stage, config.player_level, config.rebirth_count)?;
    let monster_stats = derive_monster_stats(&player, monster, &constants);
    let options = DuelOptions {
        seed: config.rng_seed,
        max_turns: config.max_turns_per_battle,
        include_logs: config.include_action_logs,
    };
    Ok(simulate_duel(&player, monster, &monster_stats, &skills, &options, &constants))
}

/// Human-readable report: a header line, then one line per duel.
pub fn format_report(report: &CombatReport) -> String {
    let mut lines = Vec::with_capacity(report.duels.len() + 1);
    lines.push(format!(
        "[combat-report] difficulty={} level={} rebirth={} winRate={:.1}% avgTurns={} avgSec={}",
        report.config.difficulty_index,
        report.config.player_level,
        report.config.rebirth_count,
        report.summary.win_rate * 100.0,
        report.summary.avg_turns,
        report.summary.avg_elapsed_sec,
    ));

    for duel in &report.duels {
        let status = if duel.status_applied_counts.is_empty() {
            "none".to_string()
        } else {
            duel.status_applied_counts
                .iter()
                .map(|(kind, count)| format!("{}:{}", kind.as_str(), count))
                .collect::<Vec<_>>()
                .join(",")
        };
        let winner = match duel.winner {
            Side::Player => "player",
            Side::Monster => "monster",
        };
        lines.push(format!(
            "- {}({}) | winner={} | turns={} | sec={} | playerHpLeft={:.1} | status={}",
            duel.monster_name, duel.monster_type, winner, duel.turns, duel.elapsed_sec, duel.player_hp_left, status,
        ));
    }
    lines.join("\n")
}
