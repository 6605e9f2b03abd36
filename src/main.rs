//! tower-tracker: record and review statistics for tower-defense runs
//!
//! Entries are stored in a local SQLite file. The `show` command opens a
//! keyboard-driven dashboard; the other commands work from the shell.

mod app;
mod cli;
mod data;
mod logging;
mod recorder;
mod ui;

use anyhow::Result;
use cli::{AddArgs, AppConfig, Cli, Commands};
use data::format::{format_coins, format_duration};
use data::stats::{summarize_by_tier, DerivedMetrics};
use data::{RunEntry, Storage};
use recorder::EntryDraft;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();
    let config = AppConfig::from_cli(&cli);

    // Logging is optional; keep going without it
    let _logger = match logging::init_logging(&config.log_level, &config.log_dir) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("warning: logging disabled: {e:#}");
            None
        }
    };

    let storage = Storage::new(config.db_path.clone());

    match cli.command {
        Commands::Show => app::run(&config)?,
        Commands::Add(args) => add_entry(&storage, args)?,
        Commands::List { run_id, json } => list_entries(&storage, run_id, json)?,
        Commands::Averages => print_averages(&storage)?,
        Commands::Delete { id } => {
            if storage.delete_entry(id)? {
                println!("Deleted entry {id}");
            } else {
                anyhow::bail!("No entry with id {id}");
            }
        }
    }

    Ok(())
}

fn add_entry(storage: &Storage, args: AddArgs) -> Result<()> {
    let run_id = match args.run_id {
        Some(id) => id,
        None => recorder::default_run_id(storage)?,
    };
    let draft = EntryDraft {
        tier: args.tier.unwrap_or_default(),
        wave: args.wave,
        coins: args.coins,
        cells: args.cells,
        time: args.time,
        notes: args.notes.unwrap_or_default(),
        end_of_round: args.end_of_round,
    };

    let id = recorder::submit(storage, run_id, &draft)?;
    if draft.end_of_round {
        println!("Added entry {id}; run {run_id} ended");
    } else {
        println!("Added entry {id} to run {run_id}");
    }
    Ok(())
}

fn list_entries(storage: &Storage, run_id: Option<i64>, json: bool) -> Result<()> {
    let entries = match run_id {
        Some(id) => storage.fetch_all_entries_for_run(id)?,
        None => storage.fetch_all_entries()?,
    };

    if json {
        #[derive(serde::Serialize)]
        struct EntryWithRates<'a> {
            #[serde(flatten)]
            entry: &'a RunEntry,
            #[serde(flatten)]
            rates: DerivedMetrics,
        }

        let rows: Vec<EntryWithRates> = entries
            .iter()
            .map(|entry| EntryWithRates {
                entry,
                rates: DerivedMetrics::from_entry(entry),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:>6} {:>6} {:>5} {:>7} {:>10} {:>8} {:>10} {:>5}  {:<16}  Notes",
        "ID", "Run", "Tier", "Wave", "Coins", "Cells", "Time", "Ended", "Collected"
    );
    for e in &entries {
        println!(
            "{:>6} {:>6} {:>5} {:>7} {:>10} {:>8} {:>10} {:>5}  {:<16}  {}",
            e.id,
            e.run_id,
            e.tier,
            e.wave,
            format_coins(e.coins),
            e.cells,
            format_duration(e.time_spent),
            if e.end_of_round { "yes" } else { "no" },
            e.datetime_collected.format("%Y-%m-%d %H:%M").to_string(),
            e.notes.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn print_averages(storage: &Storage) -> Result<()> {
    let entries = storage.fetch_all_entries()?;
    let undefined = || "-".to_string();

    println!(
        "{:>5} {:>8} {:>9} {:>15} {:>15} {:>15} {:>15}",
        "Tier", "Entries", "Avg Wave", "Avg Coins/Hour", "Avg Coins/Wave", "Avg Cells/Hour",
        "Avg Cells/Wave"
    );
    for s in summarize_by_tier(&entries) {
        println!(
            "{:>5} {:>8} {:>9.2} {:>15} {:>15} {:>15} {:>15}",
            s.tier,
            s.entries,
            s.avg_wave,
            s.avg_coins_per_hour.map(format_coins).unwrap_or_else(undefined),
            s.avg_coins_per_wave.map(format_coins).unwrap_or_else(undefined),
            s.avg_cells_per_hour
                .map(|v| format!("{v:.2}"))
                .unwrap_or_else(undefined),
            s.avg_cells_per_wave
                .map(|v| format!("{v:.2}"))
                .unwrap_or_else(undefined),
        );
    }
    Ok(())
}
