use super::types::*;
use crate::character::derived_stats::CombatUnitStats;
use crate::core::balance::{CombatConstants, MonsterRow};
use crate::core::combat_math::{
    clamp, damage_variance, defense_ratio, effective_defense, element_multiplier, hit_chance,
    round_half_up, round_to,
};
use crate::core::constants::*;
use crate::core::rng::SeededRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PLAYER_UNIT_ID: &str = "player_01";
pub const PLAYER_UNIT_NAME: &str = "Cultivator";
pub const BASIC_ATTACK_ID: &str = "basic_attack";
pub const BASIC_ATTACK_NAME: &str = "Basic Attack";
pub const BURN_TICK_ACTION_ID: &str = "status_burn_tick";
pub const STUN_SKIP_ACTION_ID: &str = "status_stun_skip";

/// Per-duel knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuelOptions {
    pub seed: u32,
    pub max_turns: u32,
    pub include_logs: bool,
}

impl Default for DuelOptions {
    fn default() -> Self {
        Self {
            seed: crate::core::rng::DEFAULT_SEED,
            max_turns: DEFAULT_MAX_TURNS_PER_BATTLE,
            include_logs: true,
        }
    }
}

/// Result of a single damage roll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageRoll {
    pub damage: u64,
    pub is_crit: bool,
    pub is_miss: bool,
    pub element_multiplier: f64,
}

impl DamageRoll {
    fn miss() -> Self {
        Self {
            damage: 0,
            is_crit: false,
            is_miss: true,
            element_multiplier: 1.0,
        }
    }
}

/// Roll one attack from `attacker` into `defender`.
///
/// Consumes up to three rolls in a fixed order: hit, crit, variance. A miss
/// consumes only the first.
#[allow(clippy::too_many_arguments)]
pub fn roll_damage(
    attacker: &RuntimeCombatUnit,
    defender: &RuntimeCombatUnit,
    coeff: f64,
    attack_element: CombatElement,
    atk_multiplier: f64,
    def_multiplier: f64,
    constants: &CombatConstants,
    rng: &mut SeededRng,
) -> DamageRoll {
    let chance = hit_chance(
        attacker.stats.accuracy,
        defender.stats.evasion,
        constants.accuracy_floor,
        constants.accuracy_ceiling,
    );
    if rng.next_f64() >= chance {
        return DamageRoll::miss();
    }

    let crit_rate = clamp(attacker.stats.crit_rate, 0.0, constants.crit_rate_cap);
    let is_crit = rng.next_f64() < crit_rate;

    let def = effective_defense(defender.stats.def, def_multiplier, attacker.stats.penetration);
    let ratio = defense_ratio(def, constants.defense_constant_k);
    let elem = element_multiplier(
        attack_element,
        defender.element,
        constants.element_advantage_bonus,
        constants.element_disadvantage_penalty,
    );

    let mut damage = attacker.stats.atk * atk_multiplier * coeff;
    damage *= 1.0 - ratio;
    damage *= 1.0 - defender.stats.damage_reduction;
    damage *= elem;
    if is_crit {
        damage *= 1.0 + attacker.stats.crit_damage;
    }
    damage *= damage_variance(rng.next_f64());

    DamageRoll {
        damage: round_half_up(damage).max(1.0) as u64,
        is_crit,
        is_miss: false,
        element_multiplier: elem,
    }
}

/// Highest-coefficient skill that is off cooldown and affordable; ties go to
/// the shorter cooldown, then to table order.
pub fn choose_player_skill<'a>(
    player: &RuntimeCombatUnit,
    skills: &'a [CombatSkill],
    now_sec: f64,
) -> Option<&'a CombatSkill> {
    let mut best: Option<&CombatSkill> = None;
    for skill in skills {
        let ready_at = player.cooldown_ready_sec.get(&skill.skill_id).copied().unwrap_or(0.0);
        if ready_at > now_sec || player.mp < skill.cost_mp {
            continue;
        }
        best = match best {
            None => Some(skill),
            Some(current) => {
                let better = skill.damage_coeff > current.damage_coeff
                    || (skill.damage_coeff == current.damage_coeff
                        && skill.cooldown_sec < current.cooldown_sec);
                if better {
                    Some(skill)
                } else {
                    Some(current)
                }
            }
        };
    }
    best
}

/// Independent chance roll; a zero chance or zero duration rolls nothing.
fn roll_status(
    target: &mut RuntimeCombatUnit,
    kind: StatusKind,
    chance: f64,
    duration_sec: f64,
    source_atk: f64,
    now_sec: f64,
    rng: &mut SeededRng,
) -> Option<bool> {
    if chance <= 0.0 || duration_sec <= 0.0 {
        return None;
    }
    if rng.next_f64() >= chance {
        return Some(false);
    }
    Some(target.apply_status(kind, duration_sec, source_atk, now_sec))
}

fn status_log(unit: &RuntimeCombatUnit, turn: u32, now_sec: f64, action_id: &str, action_name: &str, damage: u64) -> ActionLog {
    ActionLog {
        turn,
        timestamp_sec: round_to(now_sec, 3),
        actor: unit.side,
        actor_id: unit.id.clone(),
        target_id: unit.id.clone(),
        action_id: action_id.to_string(),
        action_name: action_name.to_string(),
        damage,
        is_crit: false,
        is_miss: false,
        element_multiplier: 1.0,
        applied_status: None,
        status_applied: false,
        self_heal: 0,
        target_hp_after: round_to(unit.hp, 2),
    }
}

/// Start-of-turn statuses. Returns true when the turn is consumed.
fn start_of_turn(
    actor: &mut RuntimeCombatUnit,
    turn: u32,
    now_sec: f64,
    logs: &mut Option<Vec<ActionLog>>,
) -> bool {
    actor.prune_expired(now_sec);

    if let Some(burn) = actor.active_status(StatusKind::Burn, now_sec).copied() {
        let tick = round_half_up(burn.source_atk * BURN_TICK_ATK_RATIO).max(1.0);
        actor.hp = (actor.hp - tick).max(0.0);
        if let Some(logs) = logs.as_mut() {
            logs.push(status_log(actor, turn, now_sec, BURN_TICK_ACTION_ID, "Burn", tick as u64));
        }
    }

    if !actor.is_alive() {
        return true;
    }

    if actor.has_status(StatusKind::Stun, now_sec) {
        if let Some(logs) = logs.as_mut() {
            logs.push(status_log(actor, turn, now_sec, STUN_SKIP_ACTION_ID, "Stunned", 0));
        }
        return true;
    }
    false
}

/// Simulate one duel between the player and a monster.
///
/// # Arguments
/// * `player_stats` - Derived player stats
/// * `monster` - Monster row (id, name, element, mechanic tag)
/// * `monster_stats` - Monster stats scaled from the player's
/// * `skills` - Player skill loadout
/// * `options` - Seed, turn cap, logging
/// * `constants` - Resolved combat constants
///
/// # Returns
/// A [`DuelResult`]. If neither side falls within `max_turns`, the monster wins.
pub fn simulate_duel(
    player_stats: &CombatUnitStats,
    monster: &MonsterRow,
    monster_stats: &CombatUnitStats,
    skills: &[CombatSkill],
    options: &DuelOptions,
    constants: &CombatConstants,
) -> DuelResult {
    let mut rng = SeededRng::new(options.seed);
    let rule = MonsterMechanic::parse(&monster.special_mechanic)
        .map(MonsterMechanic::rule)
        .unwrap_or_default();

    let mut player = RuntimeCombatUnit::new(
        Side::Player,
        PLAYER_UNIT_ID,
        PLAYER_UNIT_NAME,
        *player_stats,
        CombatElement::None,
    );
    let mut foe = RuntimeCombatUnit::new(
        Side::Monster,
        &monster.monster_id,
        &monster.name,
        *monster_stats,
        CombatElement::parse(&monster.element),
    );

    let mut logs: Option<Vec<ActionLog>> = options.include_logs.then(Vec::new);
    let mut used_skills: BTreeMap<String, u32> = BTreeMap::new();
    let mut status_counts: BTreeMap<StatusKind, u32> = BTreeMap::new();
    let mut first_strike_pending = rule.first_strike_damage_multiplier > 1.0;

    let mut turns: u32 = 0;
    let mut now_sec = 0.0;

    while turns < options.max_turns && player.is_alive() && foe.is_alive() {
        let player_acts = player.next_action_sec <= foe.next_action_sec;
        let (actor, target) = if player_acts {
            (&mut player, &mut foe)
        } else {
            (&mut foe, &mut player)
        };

        now_sec = actor.next_action_sec;
        turns += 1;

        let consumed = start_of_turn(actor, turns, now_sec, &mut logs);
        if !actor.is_alive() {
            break;
        }
        if consumed {
            actor.schedule_next_action(now_sec);
            continue;
        }

        let mut action_id = BASIC_ATTACK_ID.to_string();
        let mut action_name = BASIC_ATTACK_NAME.to_string();
        let mut coeff = BASIC_ATTACK_COEFF;
        let mut attack_element = actor.element;
        let mut selected: Option<&CombatSkill> = None;

        // ── Action choice ──
        if player_acts {
            match choose_player_skill(actor, skills, now_sec) {
                Some(skill) => {
                    action_id = skill.skill_id.clone();
                    action_name = skill.name.clone();
                    coeff = skill.damage_coeff;
                    attack_element = skill.element;
                    actor.mp -= skill.cost_mp;
                    actor
                        .cooldown_ready_sec
                        .insert(skill.skill_id.clone(), now_sec + skill.cooldown_sec);
                    *used_skills.entry(skill.skill_id.clone()).or_insert(0) += 1;
                    selected = Some(skill);
                }
                None => {
                    actor.mp = (actor.mp + BASIC_ATTACK_MP_RESTORE).min(actor.max_mp);
                }
            }
        } else {
            if first_strike_pending {
                coeff *= rule.first_strike_damage_multiplier;
                first_strike_pending = false;
            }
            if let Some(execute) = rule.execute {
                if target.max_hp > 0.0 && target.hp / target.max_hp <= execute.target_hp_below_ratio {
                    coeff *= execute.damage_multiplier;
                }
            }
        }

        // ── Damage ──
        let roll = roll_damage(
            actor,
            target,
            coeff,
            attack_element,
            actor.atk_multiplier(now_sec),
            target.def_multiplier(now_sec),
            constants,
            &mut rng,
        );

        let mut applied_status = None;
        let mut status_applied = false;
        let mut self_heal = 0;
        if !roll.is_miss {
            target.hp = (target.hp - roll.damage as f64).max(0.0);

            // ── On-hit effects ──
            if let Some(skill) = selected {
                if let Some(kind) = skill.status_effect {
                    let rolled = roll_status(
                        target,
                        kind,
                        clamp(skill.status_chance_pct / 100.0, 0.0, 1.0),
                        skill.status_duration_sec,
                        actor.stats.atk,
                        now_sec,
                        &mut rng,
                    );
                    applied_status = rolled.map(|_| kind);
                    status_applied = rolled.unwrap_or(false);
                }
            } else if !player_acts {
                if let Some(on_hit) = rule.on_hit_status {
                    let rolled = roll_status(
                        target,
                        on_hit.kind,
                        clamp(on_hit.chance, 0.0, 1.0),
                        on_hit.duration_sec,
                        actor.stats.atk * on_hit.source_atk_scale,
                        now_sec,
                        &mut rng,
                    );
                    applied_status = rolled.map(|_| on_hit.kind);
                    status_applied = rolled.unwrap_or(false);
                }
            }
            if status_applied {
                if let Some(kind) = applied_status {
                    *status_counts.entry(kind).or_insert(0) += 1;
                }
            }

            if !player_acts && rule.on_hit_heal_ratio > 0.0 && roll.damage > 0 {
                let ratio = clamp(rule.on_hit_heal_ratio, 0.0, 1.0);
                let heal = round_half_up(roll.damage as f64 * ratio).max(1.0);
                let before = actor.hp;
                actor.hp = (actor.hp + heal).min(actor.max_hp);
                self_heal = round_half_up(actor.hp - before).max(0.0) as u64;
            }
        }

        if let Some(logs) = logs.as_mut() {
            logs.push(ActionLog {
                turn: turns,
                timestamp_sec: round_to(now_sec, 3),
                actor: actor.side,
                actor_id: actor.id.clone(),
                target_id: target.id.clone(),
                action_id,
                action_name,
                damage: roll.damage,
                is_crit: roll.is_crit,
                is_miss: roll.is_miss,
                element_multiplier: round_to(roll.element_multiplier, 4),
                applied_status,
                status_applied,
                self_heal,
                target_hp_after: round_to(target.hp, 2),
            });
        }

        actor.schedule_next_action(now_sec);
    }

    let winner = if player.is_alive() && !foe.is_alive() {
        Side::Player
    } else {
        Side::Monster
    };

    DuelResult {
        monster_id: monster.monster_id.clone(),
        monster_name: monster.name.clone(),
        monster_type: monster.monster_type,
        winner,
        turns,
        elapsed_sec: round_to(now_sec, 3),
        player_hp_left: round_to(player.hp, 2),
        monster_hp_left: round_to(foe.hp, 2),
        used_skills,
        status_applied_counts: status_counts,
        logs: logs.unwrap_or_default(),
    }
}
