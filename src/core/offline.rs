//! Offline catch-up.
//!
//! Works out how long the player was away, caps it, and replays the capped
//! window through the auto-progress loop as one batch. The caller supplies
//! the current epoch; nothing here reads the clock.

use super::balance::BalanceIndexes;
use super::constants::*;
use super::error::SimResult;
use super::tick::{dedup_warnings, run_auto_progress, AutoEvent, AutoProgressConfig, AutoProgressSummary};
use crate::character::save::SaveV2;
use crate::core::combat_math::clamp;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OfflineCatchupInput {
    pub now_epoch_ms: u64,
    /// Start of the offline window. Defaults to the later of the save's last
    /// login and last save timestamps.
    pub anchor_epoch_ms: Option<u64>,
    pub max_offline_hours_override: Option<f64>,
    pub sync_timestamps_to_now: bool,
    /// Cadence and breakthrough knobs. `duration_sec` is ignored.
    pub auto: AutoProgressConfig,
}

impl Default for OfflineCatchupInput {
    fn default() -> Self {
        Self {
            now_epoch_ms: 0,
            anchor_epoch_ms: None,
            max_offline_hours_override: None,
            sync_timestamps_to_now: true,
            auto: AutoProgressConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineSkipReason {
    None,
    TimeNotElapsed,
    AppliedDurationZero,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineCatchupSummary {
    pub now_epoch_ms: u64,
    pub anchor_epoch_ms: u64,
    pub raw_offline_sec: u64,
    pub max_offline_sec: u64,
    pub applied_offline_sec: u64,
    pub capped_by_max_offline: bool,
    pub skip_reason: OfflineSkipReason,
    pub auto_progress_summary: Option<AutoProgressSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineCatchupResult {
    pub save: SaveV2,
    pub summary: OfflineCatchupSummary,
    pub event_logs: Vec<AutoEvent>,
    pub warnings: Vec<String>,
}

/// Seconds in the offline window.
///
/// # Errors
/// `NonNumericConstant` when `offline_reward_hours_cap` is present but not a number.
pub fn max_offline_sec(indexes: &BalanceIndexes, override_hours: Option<f64>) -> SimResult<u64> {
    let hours = match override_hours.filter(|h| h.is_finite()) {
        Some(h) => h,
        None => indexes.constant("offline_reward_hours_cap", OFFLINE_REWARD_HOURS_CAP_DEFAULT)?,
    };
    Ok((clamp(hours, 0.0, OFFLINE_HOURS_CAP_MAX) * SECONDS_PER_HOUR).floor() as u64)
}

/// Default window anchor: the later of last login and last save.
pub fn default_anchor_epoch_ms(save: &SaveV2) -> u64 {
    save.timestamps.last_login_epoch_ms.max(save.timestamps.save_epoch_ms)
}

/// Replay the time since the anchor, capped, through [`run_auto_progress`].
///
/// A zero window is not an error: the result carries a skip reason and the
/// save is only touched by the optional timestamp sync.
pub fn run_offline_catchup(
    indexes: &BalanceIndexes,
    input_save: &SaveV2,
    input: &OfflineCatchupInput,
) -> SimResult<OfflineCatchupResult> {
    let now = input.now_epoch_ms;
    let anchor = input.anchor_epoch_ms.unwrap_or_else(|| default_anchor_epoch_ms(input_save));
    let raw_offline_sec = now.saturating_sub(anchor) / 1000;
    let max_sec = max_offline_sec(indexes, input.max_offline_hours_override)?;
    let applied = raw_offline_sec.min(max_sec);
    let capped = raw_offline_sec > applied;

    let mut save = input_save.clone();
    let mut auto_summary = None;
    let mut event_logs = Vec::new();
    let mut warnings = Vec::new();

    let skip_reason = if raw_offline_sec == 0 {
        OfflineSkipReason::TimeNotElapsed
    } else if applied == 0 {
        OfflineSkipReason::AppliedDurationZero
    } else {
        let config = AutoProgressConfig {
            duration_sec: applied,
            ..input.auto.clone()
        };
        let progress = run_auto_progress(indexes, &save, &config)?;
        save = progress.save;
        auto_summary = Some(progress.summary);
        event_logs = progress.event_logs;
        warnings.extend(progress.warnings);
        OfflineSkipReason::None
    };
    if skip_reason != OfflineSkipReason::None {
        info!(raw_offline_sec, max_sec, reason = ?skip_reason, "offline catch-up skipped");
    }

    if capped {
        info!(raw_offline_sec, applied, max_sec, "offline catch-up capped");
        warnings.push(format!(
            "offline catchup capped: raw={}s applied={}s max={}s",
            raw_offline_sec, applied, max_sec
        ));
    }

    if input.sync_timestamps_to_now {
        let synced = now
            .max(save.timestamps.last_login_epoch_ms)
            .max(save.timestamps.save_epoch_ms);
        if synced > now {
            warnings.push(format!("device clock skew detected: now={}ms, synced={}ms", now, synced));
        }
        save.timestamps.last_login_epoch_ms = synced;
        save.timestamps.save_epoch_ms = synced;
    }

    Ok(OfflineCatchupResult {
        save,
        summary: OfflineCatchupSummary {
            now_epoch_ms: now,
            anchor_epoch_ms: anchor,
            raw_offline_sec,
            max_offline_sec: max_sec,
            applied_offline_sec: applied,
            capped_by_max_offline: capped,
            skip_reason,
            auto_progress_summary: auto_summary,
        },
        event_logs,
        warnings: dedup_warnings(warnings),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sample::{sample_save, sample_tables};

    const HOUR_MS: u64 = 3_600_000;

    fn indexes() -> BalanceIndexes {
        BalanceIndexes::new(sample_tables())
    }

    fn save_at(epoch_ms: u64) -> SaveV2 {
        let mut save = sample_save();
        save.settings.auto_battle = false;
        save.timestamps.last_login_epoch_ms = epoch_ms;
        save.timestamps.save_epoch_ms = epoch_ms;
        save
    }

    #[test]
    fn test_cap_defaults_to_table_constant() {
        let idx = indexes();
        assert_eq!(max_offline_sec(&idx, None).expect("cap"), 12 * 3600);
        assert_eq!(max_offline_sec(&idx, Some(18.0)).expect("cap"), 64_800);
        assert_eq!(max_offline_sec(&idx, Some(500.0)).expect("cap"), 168 * 3600);
        assert_eq!(max_offline_sec(&idx, Some(-2.0)).expect("cap"), 0);
    }

    #[test]
    fn test_anchor_is_latest_timestamp() {
        let mut save = sample_save();
        save.timestamps.last_login_epoch_ms = 5_000;
        save.timestamps.save_epoch_ms = 9_000;
        assert_eq!(default_anchor_epoch_ms(&save), 9_000);
    }

    #[test]
    fn test_no_elapsed_time_skips() {
        let idx = indexes();
        let save = save_at(10 * HOUR_MS);
        let input = OfflineCatchupInput { now_epoch_ms: 10 * HOUR_MS, ..Default::default() };
        let result = run_offline_catchup(&idx, &save, &input).expect("run");
        assert_eq!(result.summary.skip_reason, OfflineSkipReason::TimeNotElapsed);
        assert!(result.summary.auto_progress_summary.is_none());
        assert_eq!(result.save, save);
    }

    #[test]
    fn test_zero_cap_skips_with_applied_zero() {
        let idx = indexes();
        let save = save_at(0);
        let input = OfflineCatchupInput {
            now_epoch_ms: 2 * HOUR_MS,
            max_offline_hours_override: Some(0.0),
            ..Default::default()
        };
        let result = run_offline_catchup(&idx, &save, &input).expect("run");
        assert_eq!(result.summary.skip_reason, OfflineSkipReason::AppliedDurationZero);
        assert!(result.summary.capped_by_max_offline);
        assert_eq!(result.save.timestamps.save_epoch_ms, 2 * HOUR_MS);
    }

    #[test]
    fn test_window_is_capped() {
        let idx = indexes();
        let save = save_at(1_000_000);
        let input = OfflineCatchupInput {
            now_epoch_ms: 1_000_000 + 72_000 * 1000,
            max_offline_hours_override: Some(18.0),
            auto: AutoProgressConfig { tick_sec: 60, ..Default::default() },
            ..Default::default()
        };
        let result = run_offline_catchup(&idx, &save, &input).expect("run");
        assert_eq!(result.summary.raw_offline_sec, 72_000);
        assert_eq!(result.summary.applied_offline_sec, 64_800);
        assert!(result.summary.capped_by_max_offline);
        assert_eq!(result.summary.skip_reason, OfflineSkipReason::None);
        let auto = result.summary.auto_progress_summary.expect("ran");
        assert_eq!(auto.duration_sec, 64_800);
        assert!(result
            .warnings
            .contains(&"offline catchup capped: raw=72000s applied=64800s max=64800s".to_string()));
    }

    #[test]
    fn test_sync_reports_clock_skew() {
        let idx = indexes();
        let mut save = save_at(0);
        save.timestamps.last_login_epoch_ms = 50 * HOUR_MS;
        let input = OfflineCatchupInput {
            now_epoch_ms: 10 * HOUR_MS,
            anchor_epoch_ms: Some(9 * HOUR_MS),
            auto: AutoProgressConfig { tick_sec: 30, ..Default::default() },
            ..Default::default()
        };
        let result = run_offline_catchup(&idx, &save, &input).expect("run");
        assert_eq!(result.summary.raw_offline_sec, 3600);
        assert_eq!(result.save.timestamps.last_login_epoch_ms, 50 * HOUR_MS);
        assert!(result.warnings.iter().any(|w| w.starts_with("device clock skew detected")));
    }

    #[test]
    fn test_without_sync_keeps_loop_epoch() {
        let idx = indexes();
        let save = save_at(0);
        let input = OfflineCatchupInput {
            now_epoch_ms: 120_000,
            sync_timestamps_to_now: false,
            ..Default::default()
        };
        let result = run_offline_catchup(&idx, &save, &input).expect("run");
        assert_eq!(result.summary.applied_offline_sec, 120);
        assert_eq!(result.save.timestamps.save_epoch_ms, 120_000);
        assert_eq!(result.save.timestamps.last_login_epoch_ms, 0);
    }
}
