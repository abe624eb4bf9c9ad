use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::character::derived_stats::CombatUnitStats;
use crate::core::balance::{MonsterType, SkillRow};
use crate::core::constants::*;

/// Five-element cycle plus neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatElement {
    Fire,
    Ice,
    Thunder,
    Wind,
    Earth,
    None,
}

impl CombatElement {
    /// Parse a table element string. `wood` counts as earth and `metal` as
    /// thunder; anything unknown is neutral.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fire" => CombatElement::Fire,
            "ice" => CombatElement::Ice,
            "thunder" | "metal" => CombatElement::Thunder,
            "wind" => CombatElement::Wind,
            "earth" | "wood" => CombatElement::Earth,
            _ => CombatElement::None,
        }
    }

    /// The element this one beats: fire > wind > earth > thunder > ice > fire.
    pub fn beats(self) -> Option<CombatElement> {
        match self {
            CombatElement::Fire => Some(CombatElement::Wind),
            CombatElement::Wind => Some(CombatElement::Earth),
            CombatElement::Earth => Some(CombatElement::Thunder),
            CombatElement::Thunder => Some(CombatElement::Ice),
            CombatElement::Ice => Some(CombatElement::Fire),
            CombatElement::None => None,
        }
    }

    pub fn has_advantage_over(self, defender: CombatElement) -> bool {
        self.beats() == Some(defender)
    }
}

/// Timed status effects a hit can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Burn,
    Slow,
    Stun,
    ArmorBreak,
    Weaken,
}

impl StatusKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "burn" => Some(StatusKind::Burn),
            "slow" => Some(StatusKind::Slow),
            "stun" => Some(StatusKind::Stun),
            "armor_break" => Some(StatusKind::ArmorBreak),
            "weaken" => Some(StatusKind::Weaken),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::Burn => "burn",
            StatusKind::Slow => "slow",
            StatusKind::Stun => "stun",
            StatusKind::ArmorBreak => "armor_break",
            StatusKind::Weaken => "weaken",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnHitStatus {
    pub kind: StatusKind,
    pub chance: f64,
    pub duration_sec: f64,
    pub source_atk_scale: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecuteBonus {
    pub target_hp_below_ratio: f64,
    pub damage_multiplier: f64,
}

/// Declarative effect record behind a monster mechanic tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MechanicRule {
    pub passive_crit_rate_add: f64,
    pub passive_damage_reduction_add: f64,
    pub passive_def_multiplier: f64,
    pub on_hit_status: Option<OnHitStatus>,
    pub on_hit_heal_ratio: f64,
    pub first_strike_damage_multiplier: f64,
    pub execute: Option<ExecuteBonus>,
}

impl Default for MechanicRule {
    fn default() -> Self {
        Self {
            passive_crit_rate_add: 0.0,
            passive_damage_reduction_add: 0.0,
            passive_def_multiplier: 1.0,
            on_hit_status: None,
            on_hit_heal_ratio: 0.0,
            first_strike_damage_multiplier: 1.0,
            execute: None,
        }
    }
}

impl MechanicRule {
    fn on_hit(kind: StatusKind, chance: f64, duration_sec: f64, source_atk_scale: f64) -> Self {
        Self {
            on_hit_status: Some(OnHitStatus {
                kind,
                chance,
                duration_sec,
                source_atk_scale,
            }),
            ..Self::default()
        }
    }

    fn passive(def_multiplier: f64, damage_reduction_add: f64) -> Self {
        Self {
            passive_def_multiplier: def_multiplier,
            passive_damage_reduction_add: damage_reduction_add,
            ..Self::default()
        }
    }

    fn execute(target_hp_below_ratio: f64, damage_multiplier: f64) -> Self {
        Self {
            execute: Some(ExecuteBonus {
                target_hp_below_ratio,
                damage_multiplier,
            }),
            ..Self::default()
        }
    }
}

/// Closed set of monster special mechanics. Each monster carries at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonsterMechanic {
    BurnClaw,
    BurnField,
    BurnStack,
    PoisonStack,
    RootBind,
    FrozenPrison,
    TimeStop,
    ChainLightning,
    Thunderstorm,
    JudgmentMark,
    TripleTribulation,
    SlowAura,
    SlowField,
    CharmGaze,
    ArmorBreak,
    TimeCut,
    LawSuppress,
    FearAura,
    HighCrit,
    HighDef,
    AdaptiveArmor,
    LawBarrier,
    ShieldCast,
    InvulnPhase,
    BlinkStrike,
    MultiDash,
    PhaseShift,
    ExecuteMark,
    SoulHarvest,
    OriginTribulation,
    HealLink,
}

impl MonsterMechanic {
    /// Parse a mechanic tag; empty or unknown tags mean "no mechanic".
    pub fn parse(tag: &str) -> Option<Self> {
        use MonsterMechanic::*;
        let mechanic = match tag.trim() {
            "burn_claw" => BurnClaw,
            "burn_field" => BurnField,
            "burn_stack" => BurnStack,
            "poison_stack" => PoisonStack,
            "root_bind" => RootBind,
            "frozen_prison" => FrozenPrison,
            "time_stop" => TimeStop,
            "chain_lightning" => ChainLightning,
            "thunderstorm" => Thunderstorm,
            "judgment_mark" => JudgmentMark,
            "triple_tribulation" => TripleTribulation,
            "slow_aura" => SlowAura,
            "slow_field" => SlowField,
            "charm_gaze" => CharmGaze,
            "armor_break" => ArmorBreak,
            "time_cut" => TimeCut,
            "law_suppress" => LawSuppress,
            "fear_aura" => FearAura,
            "high_crit" => HighCrit,
            "high_def" => HighDef,
            "adaptive_armor" => AdaptiveArmor,
            "law_barrier" => LawBarrier,
            "shield_cast" => ShieldCast,
            "invuln_phase" => InvulnPhase,
            "blink_strike" => BlinkStrike,
            "multi_dash" => MultiDash,
            "phase_shift" => PhaseShift,
            "execute_mark" => ExecuteMark,
            "soul_harvest" => SoulHarvest,
            "origin_tribulation" => OriginTribulation,
            "heal_link" => HealLink,
            _ => return None,
        };
        Some(mechanic)
    }

    pub fn rule(self) -> MechanicRule {
        use MonsterMechanic::*;
        use StatusKind::{Burn, Slow, Stun, Weaken};
        match self {
            BurnClaw => MechanicRule::on_hit(Burn, 0.42, 4.0, 0.9),
            BurnField => MechanicRule::on_hit(Burn, 0.35, 4.5, 0.9),
            BurnStack => MechanicRule::on_hit(Burn, 0.45, 5.0, 0.95),
            PoisonStack => MechanicRule::on_hit(Burn, 0.38, 4.5, 0.75),
            RootBind => MechanicRule::on_hit(Stun, 0.26, 1.4, 1.0),
            FrozenPrison => MechanicRule::on_hit(Stun, 0.30, 1.6, 1.0),
            TimeStop => MechanicRule::on_hit(Stun, 0.34, 1.6, 1.0),
            ChainLightning | Thunderstorm | JudgmentMark | TripleTribulation => {
                MechanicRule::on_hit(Stun, 0.18, 1.0, 1.0)
            }
            SlowAura => MechanicRule::on_hit(Slow, 0.70, 4.5, 1.0),
            SlowField => MechanicRule::on_hit(Slow, 0.62, 4.0, 1.0),
            CharmGaze => MechanicRule::on_hit(Slow, 0.58, 3.8, 1.0),
            ArmorBreak | TimeCut => MechanicRule::on_hit(StatusKind::ArmorBreak, 0.56, 4.0, 1.0),
            LawSuppress | FearAura => MechanicRule::on_hit(Weaken, 0.55, 4.2, 1.0),
            HighCrit => MechanicRule {
                passive_crit_rate_add: 0.08,
                ..MechanicRule::default()
            },
            HighDef => MechanicRule::passive(1.14, 0.08),
            AdaptiveArmor => MechanicRule::passive(1.12, 0.06),
            LawBarrier => MechanicRule::passive(1.18, 0.16),
            ShieldCast => MechanicRule::passive(1.0, 0.12),
            InvulnPhase => MechanicRule::passive(1.0, 0.18),
            BlinkStrike | MultiDash | PhaseShift => MechanicRule {
                first_strike_damage_multiplier: 1.28,
                ..MechanicRule::default()
            },
            ExecuteMark => MechanicRule::execute(0.35, 1.30),
            SoulHarvest => MechanicRule::execute(0.30, 1.35),
            OriginTribulation => MechanicRule::execute(0.45, 1.40),
            HealLink => MechanicRule {
                on_hit_heal_ratio: 0.08,
                ..MechanicRule::default()
            },
        }
    }
}

/// An active skill as the duel engine sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatSkill {
    pub skill_id: String,
    pub name: String,
    pub damage_coeff: f64,
    pub cooldown_sec: f64,
    pub cost_mp: f64,
    pub element: CombatElement,
    pub status_effect: Option<StatusKind>,
    pub status_chance_pct: f64,
    pub status_duration_sec: f64,
}

impl CombatSkill {
    pub fn from_row(row: &SkillRow) -> Self {
        Self {
            skill_id: row.skill_id.clone(),
            name: row.name.clone(),
            damage_coeff: row.damage_coeff,
            cooldown_sec: row.cooldown_sec.max(0.0),
            cost_mp: row.cost_mp.max(0.0),
            element: CombatElement::parse(&row.element),
            status_effect: StatusKind::parse(&row.status_effect),
            status_chance_pct: row.status_chance_pct.max(0.0),
            status_duration_sec: row.status_duration_sec.max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Player,
    Monster,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusEffect {
    pub kind: StatusKind,
    pub until_sec: f64,
    pub source_atk: f64,
}

/// Duel-scoped mutable unit. Never leaves the engine.
#[derive(Debug, Clone)]
pub struct RuntimeCombatUnit {
    pub side: Side,
    pub id: String,
    pub name: String,
    pub element: CombatElement,
    pub hp: f64,
    pub max_hp: f64,
    pub mp: f64,
    pub max_mp: f64,
    pub next_action_sec: f64,
    pub stats: CombatUnitStats,
    pub cooldown_ready_sec: BTreeMap<String, f64>,
    pub statuses: Vec<StatusEffect>,
}

impl RuntimeCombatUnit {
    pub fn new(side: Side, id: &str, name: &str, stats: CombatUnitStats, element: CombatElement) -> Self {
        Self {
            side,
            id: id.to_string(),
            name: name.to_string(),
            element,
            hp: stats.hp,
            max_hp: stats.hp,
            mp: stats.mp,
            max_mp: stats.mp,
            next_action_sec: 1.0 / stats.speed.max(MIN_ACTION_SPEED),
            stats,
            cooldown_ready_sec: BTreeMap::new(),
            statuses: Vec::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    pub fn prune_expired(&mut self, now_sec: f64) {
        self.statuses.retain(|s| s.until_sec > now_sec);
    }

    pub fn active_status(&self, kind: StatusKind, now_sec: f64) -> Option<&StatusEffect> {
        self.statuses
            .iter()
            .find(|s| s.kind == kind && s.until_sec > now_sec)
    }

    pub fn has_status(&self, kind: StatusKind, now_sec: f64) -> bool {
        self.active_status(kind, now_sec).is_some()
    }

    /// Apply or refresh a status. A refresh keeps the later expiry and the
    /// larger source attack; instances never stack.
    pub fn apply_status(&mut self, kind: StatusKind, duration_sec: f64, source_atk: f64, now_sec: f64) -> bool {
        if duration_sec <= 0.0 {
            return false;
        }
        let until_sec = now_sec + duration_sec;
        match self.statuses.iter_mut().find(|s| s.kind == kind) {
            Some(existing) => {
                existing.until_sec = existing.until_sec.max(until_sec);
                existing.source_atk = existing.source_atk.max(source_atk);
            }
            None => self.statuses.push(StatusEffect {
                kind,
                until_sec,
                source_atk: source_atk.max(0.0),
            }),
        }
        true
    }

    pub fn speed_multiplier(&self, now_sec: f64) -> f64 {
        if self.has_status(StatusKind::Slow, now_sec) {
            SLOW_SPEED_MULTIPLIER
        } else {
            1.0
        }
    }

    pub fn atk_multiplier(&self, now_sec: f64) -> f64 {
        if self.has_status(StatusKind::Weaken, now_sec) {
            WEAKEN_ATK_MULTIPLIER
        } else {
            1.0
        }
    }

    pub fn def_multiplier(&self, now_sec: f64) -> f64 {
        if self.has_status(StatusKind::ArmorBreak, now_sec) {
            ARMOR_BREAK_DEF_MULTIPLIER
        } else {
            1.0
        }
    }

    /// Push the next action out by `1 / max(0.2, speed * slow)`.
    pub fn schedule_next_action(&mut self, now_sec: f64) {
        let effective = (self.stats.speed * self.speed_multiplier(now_sec)).max(MIN_ACTION_SPEED);
        self.next_action_sec += 1.0 / effective;
    }
}

/// One line of the optional action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLog {
    pub turn: u32,
    pub timestamp_sec: f64,
    pub actor: Side,
    pub actor_id: String,
    pub target_id: String,
    pub action_id: String,
    pub action_name: String,
    pub damage: u64,
    pub is_crit: bool,
    pub is_miss: bool,
    pub element_multiplier: f64,
    pub applied_status: Option<StatusKind>,
    pub status_applied: bool,
    pub self_heal: u64,
    pub target_hp_after: f64,
}

/// Outcome of one duel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuelResult {
    pub monster_id: String,
    pub monster_name: String,
    pub monster_type: MonsterType,
    pub winner: Side,
    pub turns: u32,
    pub elapsed_sec: f64,
    pub player_hp_left: f64,
    pub monster_hp_left: f64,
    pub used_skills: BTreeMap<String, u32>,
    pub status_applied_counts: BTreeMap<StatusKind, u32>,
    pub logs: Vec<ActionLog>,
}

impl DuelResult {
    pub fn player_won(&self) -> bool {
        self.winner == Side::Player
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(speed: f64) -> CombatUnitStats {
        CombatUnitStats {
            hp: 100.0,
            mp: 20.0,
            atk: 10.0,
            def: 5.0,
            speed,
            accuracy: 0.9,
            evasion: 0.0,
            crit_rate: 0.0,
            crit_damage: 0.5,
            penetration: 0.0,
            damage_reduction: 0.0,
        }
    }

    #[test]
    fn test_element_parse_aliases() {
        assert_eq!(CombatElement::parse(" Wood "), CombatElement::Earth);
        assert_eq!(CombatElement::parse("METAL"), CombatElement::Thunder);
        assert_eq!(CombatElement::parse("fire"), CombatElement::Fire);
        assert_eq!(CombatElement::parse("shadow"), CombatElement::None);
        assert_eq!(CombatElement::parse(""), CombatElement::None);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(StatusKind::parse("armor_break"), Some(StatusKind::ArmorBreak));
        assert_eq!(StatusKind::parse("none"), None);
        assert_eq!(StatusKind::parse(""), None);
    }

    #[test]
    fn test_every_mechanic_tag_parses() {
        let tags = [
            "burn_claw", "burn_field", "burn_stack", "poison_stack", "root_bind",
            "frozen_prison", "time_stop", "chain_lightning", "thunderstorm",
            "judgment_mark", "triple_tribulation", "slow_aura", "slow_field",
            "charm_gaze", "armor_break", "time_cut", "law_suppress", "fear_aura",
            "high_crit", "high_def", "adaptive_armor", "law_barrier", "shield_cast",
            "invuln_phase", "blink_strike", "multi_dash", "phase_shift",
            "execute_mark", "soul_harvest", "origin_tribulation", "heal_link",
        ];
        for tag in tags {
            let mechanic = MonsterMechanic::parse(tag);
            assert!(mechanic.is_some(), "tag {} should parse", tag);
            let as_json = serde_json::to_value(mechanic).expect("serializes");
            assert_eq!(as_json, tag);
        }
        assert_eq!(MonsterMechanic::parse(""), None);
        assert_eq!(MonsterMechanic::parse("dance_party"), None);
    }

    #[test]
    fn test_mechanic_rules() {
        let claw = MonsterMechanic::BurnClaw.rule();
        let status = claw.on_hit_status.expect("burn claw burns");
        assert_eq!(status.kind, StatusKind::Burn);
        assert_eq!(status.source_atk_scale, 0.9);

        let blink = MonsterMechanic::BlinkStrike.rule();
        assert_eq!(blink.first_strike_damage_multiplier, 1.28);
        assert!(blink.on_hit_status.is_none());

        let harvest = MonsterMechanic::SoulHarvest.rule();
        assert_eq!(harvest.execute.map(|e| e.damage_multiplier), Some(1.35));
        assert_eq!(MechanicRule::default().passive_def_multiplier, 1.0);
    }

    #[test]
    fn test_unit_initial_schedule() {
        let unit = RuntimeCombatUnit::new(Side::Player, "p", "P", stats(2.0), CombatElement::None);
        assert_eq!(unit.next_action_sec, 0.5);
        let slow = RuntimeCombatUnit::new(Side::Player, "p", "P", stats(0.01), CombatElement::None);
        assert_eq!(slow.next_action_sec, 5.0);
    }

    #[test]
    fn test_status_refresh_extends_and_raises() {
        let mut unit = RuntimeCombatUnit::new(Side::Monster, "m", "M", stats(1.0), CombatElement::Fire);
        assert!(unit.apply_status(StatusKind::Burn, 4.0, 50.0, 1.0));
        assert!(unit.apply_status(StatusKind::Burn, 1.0, 80.0, 2.0));
        assert_eq!(unit.statuses.len(), 1, "statuses never stack");
        let burn = unit.active_status(StatusKind::Burn, 2.0).expect("burn active");
        assert_eq!(burn.until_sec, 5.0);
        assert_eq!(burn.source_atk, 80.0);
        assert!(!unit.apply_status(StatusKind::Stun, 0.0, 10.0, 2.0));
    }

    #[test]
    fn test_status_multipliers_and_expiry() {
        let mut unit = RuntimeCombatUnit::new(Side::Player, "p", "P", stats(1.0), CombatElement::None);
        unit.apply_status(StatusKind::Slow, 2.0, 0.0, 0.0);
        unit.apply_status(StatusKind::Weaken, 2.0, 0.0, 0.0);
        unit.apply_status(StatusKind::ArmorBreak, 2.0, 0.0, 0.0);
        assert_eq!(unit.speed_multiplier(1.0), SLOW_SPEED_MULTIPLIER);
        assert_eq!(unit.atk_multiplier(1.0), WEAKEN_ATK_MULTIPLIER);
        assert_eq!(unit.def_multiplier(1.0), ARMOR_BREAK_DEF_MULTIPLIER);
        // expiry is exclusive
        assert_eq!(unit.speed_multiplier(2.0), 1.0);
        unit.prune_expired(2.0);
        assert!(unit.statuses.is_empty());
    }

    #[test]
    fn test_schedule_next_action_under_slow() {
        let mut unit = RuntimeCombatUnit::new(Side::Player, "p", "P", stats(1.0), CombatElement::None);
        unit.apply_status(StatusKind::Slow, 5.0, 0.0, 0.0);
        let before = unit.next_action_sec;
        unit.schedule_next_action(1.0);
        assert!((unit.next_action_sec - before - 1.0 / 0.75).abs() < 1e-12);
    }
}
