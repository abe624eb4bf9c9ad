//! Cultivation headless simulator.
//!
//! Drives the library against a balance set and a save without any UI.
//! Tables and saves are JSON; when no file is given the built-in sample set
//! is used.
//!
//! Usage:
//!   cargo run --bin simulator -- combat --difficulty 20 --level 30
//!   cargo run --bin simulator -- trials --difficulty 5 --qi 100000 -n 5000
//!   cargo run --bin simulator -- auto --save save.json --duration 3600 --out next.json
//!   cargo run --bin simulator -- offline --save save.json
//!   cargo run --bin simulator -- batch --runs 50 --json

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use cultivation::build_info::VERSION_LINE;
use cultivation::character::rebirth::RebirthLevels;
use cultivation::character::save::SaveV2;
use cultivation::combat::report::{format_report, run_combat_report, CombatReportConfig};
use cultivation::core::balance::{BalanceIndexes, BalanceTables};
use cultivation::core::offline::{run_offline_catchup, OfflineCatchupInput};
use cultivation::core::rng::DEFAULT_SEED;
use cultivation::core::sample::{sample_save, sample_tables};
use cultivation::core::tick::{run_auto_progress, AutoProgressConfig};
use cultivation::progression::tribulation::{run_breakthrough_trials, BreakthroughAttemptInput, BreakthroughTrialInput};
use cultivation::simulator::{run_simulation, SimConfig};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

// ── CLI Configuration ────────────────────────────────────────────────

#[derive(Parser)]
#[command(version = VERSION_LINE, about = "Headless cultivation simulator")]
struct Cli {
    /// Balance tables JSON (defaults to the built-in sample set)
    #[arg(long, global = true)]
    tables: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Duel a stage's monsters with a two-skill loadout.
    Combat(CombatArgs),
    /// Repeat one breakthrough attempt many times and report outcome rates.
    Trials(TrialArgs),
    /// Advance a save by simulated seconds.
    Auto(AutoArgs),
    /// Replay the time since the save's last timestamp.
    Offline(OfflineArgs),
    /// Run a seeded batch of combat reports and trial sets.
    Batch(BatchArgs),
}

#[derive(Args)]
struct CombatArgs {
    #[arg(long, default_value_t = 20)]
    difficulty: u32,
    #[arg(long, default_value_t = 30)]
    level: u32,
    #[arg(long, default_value_t = 2)]
    rebirths: u32,
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u32,
    /// Skill ids, comma separated
    #[arg(long, value_delimiter = ',')]
    skills: Vec<String>,
    /// Monster ids, comma separated
    #[arg(long, value_delimiter = ',')]
    monsters: Vec<String>,
    /// Include the per-action log in JSON output
    #[arg(long)]
    logs: bool,
}

#[derive(Args)]
struct TrialArgs {
    #[arg(long, default_value_t = 5)]
    difficulty: u32,
    #[arg(long, default_value_t = 1_000_000)]
    qi: u64,
    #[arg(short = 'n', long, default_value_t = 1000)]
    trials: u32,
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u32,
    #[arg(long, default_value_t = 0)]
    fail_streak: u32,
    #[arg(long, default_value_t = 0)]
    rebirths: u32,
    /// Consumable ids, comma separated
    #[arg(long, value_delimiter = ',')]
    items: Vec<String>,
}

#[derive(Args)]
struct SaveArgs {
    /// Save JSON (defaults to the built-in starter save)
    #[arg(long)]
    save: Option<PathBuf>,
    /// Write the resulting save here
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct AutoArgs {
    #[command(flatten)]
    save: SaveArgs,
    #[arg(long, default_value_t = 60)]
    duration: u64,
    #[arg(long, default_value_t = 1)]
    tick: u64,
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u32,
}

#[derive(Args)]
struct OfflineArgs {
    #[command(flatten)]
    save: SaveArgs,
    /// Current epoch in ms (defaults to the system clock)
    #[arg(long)]
    now_ms: Option<u64>,
    #[arg(long)]
    max_hours: Option<f64>,
    #[arg(long, default_value_t = 60)]
    tick: u64,
    #[arg(long)]
    no_sync: bool,
}

#[derive(Args)]
struct BatchArgs {
    /// Full `SimConfig` JSON; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    runs: Option<u32>,
    #[arg(long)]
    seed: Option<u32>,
    #[arg(long)]
    difficulty: Option<u32>,
}

// ── Loading ──────────────────────────────────────────────────────────

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn load_indexes(path: Option<&Path>) -> Result<BalanceIndexes> {
    let tables: BalanceTables = match path {
        Some(p) => read_json(p)?,
        None => sample_tables(),
    };
    Ok(BalanceIndexes::new(tables))
}

fn load_save(args: &SaveArgs) -> Result<SaveV2> {
    match &args.save {
        Some(p) => read_json(p),
        None => Ok(sample_save()),
    }
}

fn write_save(args: &SaveArgs, save: &SaveV2) -> Result<()> {
    if let Some(out) = &args.out {
        fs::write(out, save.to_json_pretty()?).with_context(|| format!("writing {}", out.display()))?;
        eprintln!("Save written to {}", out.display());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── Commands ─────────────────────────────────────────────────────────

fn handle_combat(indexes: &BalanceIndexes, args: CombatArgs, json: bool) -> Result<()> {
    let defaults = CombatReportConfig::default();
    let config = CombatReportConfig {
        difficulty_index: args.difficulty,
        player_level: args.level,
        rebirth_count: args.rebirths,
        rng_seed: args.seed,
        skill_ids: if args.skills.is_empty() { defaults.skill_ids } else { args.skills },
        monster_ids: if args.monsters.is_empty() { defaults.monster_ids } else { args.monsters },
        max_turns_per_battle: defaults.max_turns_per_battle,
        include_action_logs: args.logs,
    };
    let report = run_combat_report(indexes, &config)?;
    if json {
        print_json(&report)
    } else {
        println!("{}", format_report(&report));
        Ok(())
    }
}

fn handle_trials(indexes: &BalanceIndexes, args: TrialArgs, json: bool) -> Result<()> {
    let input = BreakthroughTrialInput {
        attempt: BreakthroughAttemptInput {
            difficulty_index: args.difficulty,
            current_qi: args.qi,
            fail_streak: args.fail_streak,
            rebirth_levels: RebirthLevels::inferred(args.rebirths),
            consumable_item_ids: args.items,
            ..Default::default()
        },
        trials: args.trials,
        seed: args.seed,
    };
    let report = run_breakthrough_trials(indexes, &input)?;
    if json {
        return print_json(&report);
    }
    println!(
        "Stage {} ({}) x {} trials, seed={}",
        report.difficulty_index, report.sample.stage_name, report.trials, report.seed
    );
    println!(
        "  success={} minor={} retreat={} death={} blocked={}",
        report.counts.success,
        report.counts.minor_fail,
        report.counts.retreat_fail,
        report.counts.death_fail,
        report.counts.blocked_no_qi
    );
    println!(
        "  success {:.1}%  death {:.1}%  avg retreat {:.2}  avg qi delta {:.1}",
        report.rates.success * 100.0,
        report.rates.death_fail * 100.0,
        report.avg_retreat_layers_when_retreat,
        report.avg_qi_delta
    );
    Ok(())
}

fn handle_auto(indexes: &BalanceIndexes, args: AutoArgs, json: bool) -> Result<()> {
    let save = load_save(&args.save)?;
    let config = AutoProgressConfig {
        duration_sec: args.duration,
        tick_sec: args.tick,
        rng_seed: args.seed,
        ..Default::default()
    };
    let result = run_auto_progress(indexes, &save, &config)?;
    write_save(&args.save, &result.save)?;
    if json {
        return print_json(&result);
    }
    let s = &result.summary;
    println!(
        "{}s in {} ticks -> {} (stage {})",
        s.duration_sec, s.ticks, s.final_stage_name, s.final_difficulty_index
    );
    println!(
        "  qi {:+}  coin {:+}  essence {:+}  rebirths {:+}",
        s.qi_delta, s.spirit_coin_delta, s.rebirth_essence_delta, s.rebirth_count_delta
    );
    println!(
        "  battles {} (won {})  breakthrough attempts {} (success {})",
        s.battles.total, s.battles.wins, s.breakthroughs.attempts, s.breakthroughs.outcomes.success
    );
    for warning in &result.warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}

fn handle_offline(indexes: &BalanceIndexes, args: OfflineArgs, json: bool) -> Result<()> {
    let save = load_save(&args.save)?;
    let now_epoch_ms = match args.now_ms {
        Some(ms) => ms,
        None => u64::try_from(Utc::now().timestamp_millis()).context("system clock before 1970")?,
    };
    let input = OfflineCatchupInput {
        now_epoch_ms,
        max_offline_hours_override: args.max_hours,
        sync_timestamps_to_now: !args.no_sync,
        auto: AutoProgressConfig {
            tick_sec: args.tick,
            ..Default::default()
        },
        ..Default::default()
    };
    let result = run_offline_catchup(indexes, &save, &input)?;
    write_save(&args.save, &result.save)?;
    if json {
        return print_json(&result);
    }
    let s = &result.summary;
    println!(
        "offline raw={}s applied={}s max={}s capped={} skip={:?}",
        s.raw_offline_sec, s.applied_offline_sec, s.max_offline_sec, s.capped_by_max_offline, s.skip_reason
    );
    if let Some(auto) = &s.auto_progress_summary {
        println!(
            "  -> {} (stage {}), qi {:+}, battles {}",
            auto.final_stage_name, auto.final_difficulty_index, auto.qi_delta, auto.battles.total
        );
    }
    for warning in &result.warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}

fn handle_batch(indexes: &BalanceIndexes, args: BatchArgs, json: bool) -> Result<()> {
    let mut config: SimConfig = match &args.config {
        Some(p) => read_json(p)?,
        None => SimConfig::default(),
    };
    if let Some(runs) = args.runs {
        config.num_runs = runs;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(d) = args.difficulty {
        config.combat.difficulty_index = d;
        config.trials.attempt.difficulty_index = d;
    }
    if json {
        config.verbosity = 0;
    }
    let report = run_simulation(indexes, &config)?;
    if json {
        print_json(&report)
    } else {
        println!("{}", report.to_text());
        Ok(())
    }
}

// ── Main ─────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let indexes = load_indexes(cli.tables.as_deref())?;
    match cli.command {
        Commands::Combat(args) => handle_combat(&indexes, args, cli.json),
        Commands::Trials(args) => handle_trials(&indexes, args, cli.json),
        Commands::Auto(args) => handle_auto(&indexes, args, cli.json),
        Commands::Offline(args) => handle_offline(&indexes, args, cli.json),
        Commands::Batch(args) => handle_batch(&indexes, args, cli.json),
    }
}
