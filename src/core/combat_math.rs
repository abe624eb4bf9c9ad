//! Shared combat math functions for the duel engine and the simulators.
//!
//! These pure functions calculate combat outcomes without side effects.
//! Rounding helpers live here too so every report rounds the same way.

use super::constants::{
    DAMAGE_VARIANCE_MIN, DAMAGE_VARIANCE_SPAN, ELEMENT_PENALTY_FLOOR, HIT_CHANCE_OFFSET,
};
use crate::combat::types::CombatElement;

/// Clamp without panicking when `min > max` (the lower bound wins).
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    min.max(max.min(value))
}

/// Round half toward positive infinity, the way the reports expect.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Round to a fixed number of decimals for report output.
///
/// # Arguments
/// * `value` - Raw value
/// * `decimals` - Decimal places to keep (timestamps 3, hp 2, multipliers 4)
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Chance that an attack lands.
///
/// # Arguments
/// * `accuracy` - Attacker accuracy
/// * `evasion` - Defender evasion
/// * `floor` / `ceiling` - Global accuracy bounds from the combat constants
///
/// # Returns
/// `clamp(accuracy - evasion + 0.75, floor, ceiling)`
pub fn hit_chance(accuracy: f64, evasion: f64, floor: f64, ceiling: f64) -> f64 {
    clamp(accuracy - evasion + HIT_CHANCE_OFFSET, floor, ceiling)
}

/// Defender defense after status multiplier and attacker penetration.
pub fn effective_defense(defense: f64, defense_multiplier: f64, penetration: f64) -> f64 {
    (defense * defense_multiplier * (1.0 - penetration)).max(0.0)
}

/// Diminishing-returns armor curve: `def / (def + k)`.
pub fn defense_ratio(effective_defense: f64, defense_constant_k: f64) -> f64 {
    let denom = effective_defense + defense_constant_k;
    if denom <= 0.0 {
        return 0.0;
    }
    effective_defense / denom
}

/// Elemental multiplier for an attack.
///
/// Advantage grants `1 + bonus`; disadvantage applies `1 + penalty`
/// floored at 0.10; everything else is neutral.
pub fn element_multiplier(
    attacker: CombatElement,
    defender: CombatElement,
    advantage_bonus: f64,
    disadvantage_penalty: f64,
) -> f64 {
    if attacker.has_advantage_over(defender) {
        1.0 + advantage_bonus
    } else if defender.has_advantage_over(attacker) {
        (1.0 + disadvantage_penalty).max(ELEMENT_PENALTY_FLOOR)
    } else {
        1.0
    }
}

/// Damage variance factor for a `[0, 1)` roll, in `[0.95, 1.05)`.
pub fn damage_variance(roll: f64) -> f64 {
    DAMAGE_VARIANCE_MIN + roll * DAMAGE_VARIANCE_SPAN
}
