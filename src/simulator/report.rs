//! Simulation report generation.

use crate::combat::report::CombatSummary;
use crate::core::combat_math::round_to;
use crate::progression::tribulation::{OutcomeCounts, OutcomeRates};
use serde::{Deserialize, Serialize};

/// What one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub run_index: u32,
    pub seed: u32,
    pub combat: CombatSummary,
    pub trial_counts: OutcomeCounts,
    pub avg_qi_delta: f64,
}

/// Aggregated results from multiple runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimReport {
    pub num_runs: u32,

    // Combat
    pub total_duels: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub avg_turns: f64,

    // Breakthrough trials
    pub total_trials: u32,
    pub outcome_counts: OutcomeCounts,
    pub outcome_rates: OutcomeRates,
    pub avg_qi_delta: f64,

    /// SHA-256 over every serialized combat report and trial report, in run
    /// order. Equal digests mean byte-identical outputs.
    pub digest: String,

    pub run_stats: Vec<RunStats>,
}

impl SimReport {
    pub fn from_runs(runs: Vec<RunStats>, digest: String) -> Self {
        let num_runs = runs.len() as u32;
        let total_duels: u32 = runs.iter().map(|r| r.combat.total).sum();
        let wins: u32 = runs.iter().map(|r| r.combat.wins).sum();
        let losses: u32 = runs.iter().map(|r| r.combat.losses).sum();

        let turns_weighted: f64 = runs
            .iter()
            .map(|r| r.combat.avg_turns * f64::from(r.combat.total))
            .sum();
        let avg_turns = round_to(turns_weighted / f64::from(total_duels.max(1)), 2);

        let mut outcome_counts = OutcomeCounts::default();
        for run in &runs {
            let c = &run.trial_counts;
            outcome_counts.blocked_no_qi += c.blocked_no_qi;
            outcome_counts.success += c.success;
            outcome_counts.minor_fail += c.minor_fail;
            outcome_counts.retreat_fail += c.retreat_fail;
            outcome_counts.death_fail += c.death_fail;
        }
        let total_trials = outcome_counts.total();
        let avg_qi_delta = round_to(
            runs.iter().map(|r| r.avg_qi_delta).sum::<f64>() / f64::from(num_runs.max(1)),
            4,
        );

        Self {
            num_runs,
            total_duels,
            wins,
            losses,
            win_rate: round_to(f64::from(wins) / f64::from(total_duels.max(1)), 4),
            avg_turns,
            total_trials,
            outcome_counts,
            outcome_rates: OutcomeRates::from_counts(&outcome_counts, total_trials.max(1)),
            avg_qi_delta,
            digest,
            run_stats: runs,
        }
    }

    /// Generate a text report.
    pub fn to_text(&self) -> String {
        let mut report = String::new();

        report.push_str("═══════════════════════════════════════════════════════════════\n");
        report.push_str("                  CULTIVATION BATCH REPORT\n");
        report.push_str("═══════════════════════════════════════════════════════════════\n\n");

        report.push_str(&format!("Runs: {}\n", self.num_runs));
        report.push_str(&format!("Digest: {}\n\n", self.digest));

        report.push_str("── COMBAT ───────────────────────────────────────────────────────\n");
        report.push_str(&format!("  Duels:          {}\n", self.total_duels));
        report.push_str(&format!("  Wins / Losses:  {} / {}\n", self.wins, self.losses));
        report.push_str(&format!("  Win Rate:       {:.1}%\n", self.win_rate * 100.0));
        report.push_str(&format!("  Avg Turns:      {:.2}\n\n", self.avg_turns));

        report.push_str("── BREAKTHROUGH TRIALS ──────────────────────────────────────────\n");
        report.push_str(&format!("  Trials:         {}\n", self.total_trials));
        let rows = [
            ("Success", self.outcome_counts.success, self.outcome_rates.success),
            ("Minor Fail", self.outcome_counts.minor_fail, self.outcome_rates.minor_fail),
            ("Retreat Fail", self.outcome_counts.retreat_fail, self.outcome_rates.retreat_fail),
            ("Death Fail", self.outcome_counts.death_fail, self.outcome_rates.death_fail),
            ("Blocked (No Qi)", self.outcome_counts.blocked_no_qi, self.outcome_rates.blocked_no_qi),
        ];
        for (label, count, rate) in rows {
            let bar: String = "█".repeat((rate * 20.0) as usize);
            report.push_str(&format!("  {:<16} {:>6} {:>6.1}% {}\n", label, count, rate * 100.0, bar));
        }
        report.push_str(&format!("  Avg Qi Delta:   {:.1}\n\n", self.avg_qi_delta));

        report.push_str("── BALANCE ASSESSMENT ───────────────────────────────────────────\n");
        let combat_rating = if self.win_rate > 0.95 {
            "TOO EASY - Player rarely loses"
        } else if self.win_rate > 0.6 {
            "GOOD - Challenging but fair"
        } else if self.win_rate > 0.3 {
            "HARD - Many losses"
        } else {
            "TOO HARD - Player rarely wins"
        };
        report.push_str(&format!("  Combat Rating:  {}\n", combat_rating));
        if self.outcome_rates.death_fail > 0.25 {
            report.push_str("  ⚠️  Tribulation death rate above 25%\n");
        }
        if self.outcome_rates.blocked_no_qi > 0.0 {
            report.push_str("  ⚠️  Some trials had too little qi to attempt\n");
        }

        report
    }

    /// Single-line summary.
    pub fn summary_line(&self) -> String {
        format!(
            "runs={} duels={} winRate={:.4} trials={} success={:.4} death={:.4} digest={}",
            self.num_runs,
            self.total_duels,
            self.win_rate,
            self.total_trials,
            self.outcome_rates.success,
            self.outcome_rates.death_fail,
            &self.digest[..self.digest.len().min(16)]
        )
    }
}
