//! Integration test: save progression end to end
//!
//! Drives the public save-level entry points (single breakthrough step, the
//! auto-progress loop, offline catch-up) against the built-in sample set.

use cultivation::character::save::SaveV2;
use cultivation::core::balance::BalanceIndexes;
use cultivation::core::offline::{run_offline_catchup, OfflineCatchupInput, OfflineSkipReason};
use cultivation::core::sample::{sample_save, sample_tables};
use cultivation::core::tick::{run_auto_progress, AutoEventDetail, AutoProgressConfig};
use cultivation::progression::breakthrough::{
    apply_breakthrough_step, set_progression_stage, BreakthroughStepOptions,
};
use cultivation::progression::tribulation::BreakthroughOutcome;

fn indexes() -> BalanceIndexes {
    BalanceIndexes::new(sample_tables())
}

/// A save sitting on a tribulation stage with qi to spare.
fn tribulation_save(idx: &BalanceIndexes, difficulty_index: u32) -> SaveV2 {
    let mut save = sample_save();
    set_progression_stage(&mut save.progression, idx, difficulty_index).expect("stage");
    save.currencies.qi = idx.stage(difficulty_index).expect("stage").qi_required * 3;
    save.currencies.spirit_coin = 1_234;
    save.settings.auto_tribulation = true;
    save
}

#[test]
fn test_death_on_tribulation_triggers_rebirth() {
    let idx = indexes();
    let save = tribulation_save(&idx, 30);

    let died = (0..5_000u32).find_map(|seed| {
        let options = BreakthroughStepOptions { rng_seed: seed, ..Default::default() };
        let step = apply_breakthrough_step(&idx, &save, &options).expect("step");
        let outcome = step.attempt_result.as_ref().map(|a| a.outcome);
        (outcome == Some(BreakthroughOutcome::DeathFail)).then_some(step)
    });
    let step = died.expect("a death within 5000 seeds");

    let settlement = step.rebirth_settlement.expect("settlement");
    assert!(settlement.triggered);
    assert_eq!(settlement.pre_rebirth_count, 0);
    assert_eq!(settlement.post_rebirth_count, 1);
    assert!(settlement.reward.final_essence >= 5);

    assert_eq!(step.save.progression.rebirth_count, 1);
    assert_eq!(step.save.progression.difficulty_index, 1);
    assert_eq!(step.save.currencies.qi, 0);
    assert_eq!(step.save.currencies.spirit_coin, 0);
    assert_eq!(step.save.currencies.rebirth_essence, settlement.reward.final_essence);
    assert_eq!(step.save.pity_counters.tribulation_fail_streak, 0);
    // input untouched
    assert_eq!(save.progression.difficulty_index, 30);
}

#[test]
fn test_failures_never_raise_qi() {
    let idx = indexes();
    let save = tribulation_save(&idx, 15);

    for seed in 0..300u32 {
        let options = BreakthroughStepOptions { rng_seed: seed, ..Default::default() };
        let step = apply_breakthrough_step(&idx, &save, &options).expect("step");
        let attempt = step.attempt_result.expect("attempted");
        if attempt.outcome.is_failure() {
            assert!(step.save.currencies.qi <= save.currencies.qi);
        }
        if attempt.outcome == BreakthroughOutcome::RetreatFail {
            let landed = step.save.progression.difficulty_index;
            assert!((13..=14).contains(&landed), "retreat landed on {}", landed);
        }
    }
}

#[test]
fn test_empty_qi_makes_no_attempts() {
    let idx = indexes();
    let mut save = sample_save();
    save.settings.auto_battle = false;
    save.currencies.qi = 0;

    let config = AutoProgressConfig { duration_sec: 60, ..Default::default() };
    let result = run_auto_progress(&idx, &save, &config).expect("auto");
    assert_eq!(result.summary.breakthroughs.attempts, 0);
    assert_eq!(result.summary.breakthroughs.outcomes.blocked_no_qi, 20);
    assert_eq!(result.summary.final_difficulty_index, 1);
    assert!(result
        .event_logs
        .iter()
        .all(|e| !matches!(e.detail, AutoEventDetail::Breakthrough { .. })));
}

#[test]
fn test_auto_progress_is_deterministic() {
    let idx = indexes();
    let mut save = sample_save();
    save.currencies.qi = 50_000;
    let config = AutoProgressConfig { duration_sec: 900, tick_sec: 5, ..Default::default() };

    let a = run_auto_progress(&idx, &save, &config).expect("auto");
    let b = run_auto_progress(&idx, &save, &config).expect("auto");
    assert_eq!(a.save.fingerprint(), b.save.fingerprint());
    assert_eq!(a.summary, b.summary);
    assert_eq!(a.event_logs, b.event_logs);
    assert_eq!(
        serde_json::to_string(&a).expect("json"),
        serde_json::to_string(&b).expect("json")
    );
    assert_eq!(a.save.timestamps.save_epoch_ms, save.timestamps.save_epoch_ms + 900_000);
    assert!(a.summary.battles.total > 0);
}

#[test]
fn test_offline_window_capped_at_override() {
    let idx = indexes();
    let mut save = sample_save();
    save.settings.auto_battle = false;
    let anchor = save.timestamps.save_epoch_ms;

    let input = OfflineCatchupInput {
        now_epoch_ms: anchor + 72_000 * 1000,
        max_offline_hours_override: Some(18.0),
        auto: AutoProgressConfig { tick_sec: 60, ..Default::default() },
        ..Default::default()
    };
    let result = run_offline_catchup(&idx, &save, &input).expect("offline");

    assert_eq!(result.summary.anchor_epoch_ms, anchor);
    assert_eq!(result.summary.raw_offline_sec, 72_000);
    assert_eq!(result.summary.max_offline_sec, 64_800);
    assert_eq!(result.summary.applied_offline_sec, 64_800);
    assert!(result.summary.capped_by_max_offline);
    assert_eq!(result.summary.skip_reason, OfflineSkipReason::None);
    assert_eq!(result.save.timestamps.last_login_epoch_ms, input.now_epoch_ms);
    assert_eq!(result.save.timestamps.save_epoch_ms, input.now_epoch_ms);
}

#[test]
fn test_offline_without_elapsed_time_is_a_no_op() {
    let idx = indexes();
    let save = sample_save();
    let input = OfflineCatchupInput {
        now_epoch_ms: save.timestamps.save_epoch_ms,
        ..Default::default()
    };
    let result = run_offline_catchup(&idx, &save, &input).expect("offline");
    assert_eq!(result.summary.skip_reason, OfflineSkipReason::TimeNotElapsed);
    assert_eq!(result.save.fingerprint(), save.fingerprint());
    assert!(result.event_logs.is_empty());
}
