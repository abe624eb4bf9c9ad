// Combat timing
pub const MIN_ACTION_SPEED: f64 = 0.2;
pub const DEFAULT_MAX_TURNS_PER_BATTLE: u32 = 180;
pub const AUTO_BATTLE_MAX_TURNS: u32 = 160;

// Damage math
pub const HIT_CHANCE_OFFSET: f64 = 0.75;
pub const BASIC_ATTACK_COEFF: f64 = 1.0;
pub const BASIC_ATTACK_MP_RESTORE: f64 = 6.0;
pub const DAMAGE_VARIANCE_MIN: f64 = 0.95;
pub const DAMAGE_VARIANCE_SPAN: f64 = 0.10;
pub const ELEMENT_PENALTY_FLOOR: f64 = 0.10;
pub const PLAYER_PENETRATION_CAP: f64 = 0.65;

// Combat constant fallbacks (keys looked up in the combat constant table)
pub const ACCURACY_FLOOR_DEFAULT: f64 = 0.55;
pub const ACCURACY_CEILING_DEFAULT: f64 = 0.98;
pub const CRIT_RATE_CAP_DEFAULT: f64 = 0.75;
pub const EVASION_CAP_DEFAULT: f64 = 0.60;
pub const DAMAGE_REDUCTION_CAP_DEFAULT: f64 = 0.70;
pub const DEFENSE_CONSTANT_K_DEFAULT: f64 = 180.0;
pub const ELEMENT_ADVANTAGE_BONUS_DEFAULT: f64 = 0.25;
pub const ELEMENT_DISADVANTAGE_PENALTY_DEFAULT: f64 = -0.20;
pub const OFFLINE_REWARD_HOURS_CAP_DEFAULT: f64 = 12.0;

// Status effects
pub const BURN_TICK_ATK_RATIO: f64 = 0.12;
pub const SLOW_SPEED_MULTIPLIER: f64 = 0.75;
pub const WEAKEN_ATK_MULTIPLIER: f64 = 0.85;
pub const ARMOR_BREAK_DEF_MULTIPLIER: f64 = 0.80;

// Monster scaling relative to the player
pub const MONSTER_HP_FACTOR: f64 = 1.05;
pub const MONSTER_ATK_FACTOR: f64 = 0.88;
pub const MONSTER_DEF_FACTOR: f64 = 0.92;
pub const MONSTER_MULT_FLOOR: f64 = 0.5;
pub const MONSTER_SPEED_MULT_FLOOR: f64 = 0.3;
pub const MONSTER_BASE_ACCURACY: f64 = 0.72;
pub const MONSTER_ACCURACY_PER_ATK_MULT: f64 = 0.08;
pub const MONSTER_CRIT_DAMAGE: f64 = 0.45;
pub const MONSTER_PENETRATION_PER_ATK_MULT: f64 = 0.07;
pub const MONSTER_PENETRATION_CAP: f64 = 0.45;
pub const MONSTER_DAMAGE_REDUCTION_PER_DEF_MULT: f64 = 0.10;

// Breakthrough / tribulation
pub const SUCCESS_PCT_MIN: f64 = 5.0;
pub const SUCCESS_PCT_MAX: f64 = 95.0;
pub const DEATH_PCT_MAX: f64 = 90.0;
pub const FAIL_STREAK_BONUS_PER_STACK_PCT: f64 = 1.25;
pub const FAIL_STREAK_BONUS_CAP_PCT: f64 = 18.0;
pub const MINOR_FAIL_QI_LOSS_RATIO: f64 = 0.12;
pub const MINOR_FAIL_MATERIAL_LOSS_PCT: f64 = 10.0;
pub const STREAK_COUNTER_CAP: u32 = 9999;
pub const EFFECT_BREAKTHROUGH_BONUS: &str = "breakthrough_bonus_flat_pct";
pub const EFFECT_TRIBULATION_GUARD: &str = "tribulation_death_reduce_flat_pct";
pub const EFFECT_REBIRTH_ESSENCE_MUL: &str = "rebirth_essence_mul_pct";

// Rebirth
pub const REBIRTH_LEVEL_CAP: u32 = 20;
pub const REBIRTH_REWARD_WEIGHT_SCALE: f64 = 12.0;
pub const REBIRTH_REWARD_DIFFICULTY_SCALE: f64 = 0.85;
pub const REBIRTH_REWARD_COUNT_SCALE_PCT: f64 = 1.5;
pub const REBIRTH_REWARD_MIN: u64 = 5;
pub const REBIRTH_REWARD_MAX: u64 = 5000;

// Passive cultivation curve: hours = base * (1 + phase) * norm^EXP * (1 + idx * DIFF)
pub const CULTIVATION_GROWTH_EXPONENT: f64 = 0.09;
pub const CULTIVATION_DIFFICULTY_FACTOR: f64 = 0.0009;
pub const OFFLINE_MULTIPLIER_PASSIVE_SCALE: f64 = 0.05;
pub const CULTIVATION_SPEED_LEVEL_DIVISOR: u32 = 2;
pub const OFFLINE_EFFICIENCY_LEVEL_DIVISOR: u32 = 4;

// Auto-progress cadence
pub const AUTO_DURATION_SEC_DEFAULT: u64 = 60;
pub const AUTO_TICK_SEC_DEFAULT: u64 = 1;
pub const AUTO_BATTLE_INTERVAL_SEC_DEFAULT: u64 = 18;
pub const AUTO_BREAKTHROUGH_CHECK_SEC_DEFAULT: u64 = 3;
pub const AUTO_MAX_EVENT_LOGS_DEFAULT: usize = 400;
pub const AUTO_PENALTY_GUARD_MAX_PCT: f64 = 95.0;
pub const BREAKTHROUGH_SEED_ELAPSED_MULT: u64 = 13;
pub const BREAKTHROUGH_SEED_BATTLE_MULT: u64 = 17;

// Auto-battle picks and rewards
pub const ELITE_ROLL_THRESHOLD: f64 = 0.70;
pub const BOSS_ROLL_THRESHOLD: f64 = 0.90;
pub const AUTO_PLAYER_LEVEL_BASE: f64 = 8.0;
pub const AUTO_PLAYER_LEVEL_PER_DIFFICULTY: f64 = 0.55;
pub const AUTO_PLAYER_LEVEL_MAX: u32 = 120;
pub const AUTO_SKILL_LOADOUT: usize = 2;
pub const FALLBACK_SKILL_IDS: [&str; 2] = ["sk_atk_001", "sk_atk_002"];
pub const REWARD_SPIRIT_BASE: f64 = 120.0;
pub const REWARD_SPIRIT_PER_DIFFICULTY: f64 = 7.0;
pub const REWARD_QI_WIN_RATIO: f64 = 0.0045;
pub const REWARD_QI_LOSS_RATIO: f64 = 0.0015;
pub const REWARD_VARIANCE_MIN: f64 = 0.9;
pub const REWARD_VARIANCE_SPAN: f64 = 0.2;

// Offline catch-up
pub const OFFLINE_HOURS_CAP_MAX: f64 = 168.0;
pub const SECONDS_PER_HOUR: f64 = 3600.0;
