//! Command-line interface argument parsing for tower-tracker.
//!
//! - `tower-tracker show` opens the dashboard
//! - `tower-tracker add --tier 5 --wave 120 --coins 17.09M --cells 340 --time 01:20:00`
//! - `tower-tracker list --run-id 3 --json`
//! - `tower-tracker averages`
//! - `tower-tracker delete 42`

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Environment variable overriding the database file location
pub const DB_PATH_ENV: &str = "TOWER_TRACKER_DB";

const APP_DIR: &str = "tower-tracker";
const DB_FILE_NAME: &str = "game_stats.db";

/// Record and review statistics for tower-defense runs.
#[derive(Parser, Debug)]
#[command(name = "tower-tracker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the statistics database file
    /// Defaults to $TOWER_TRACKER_DB, then <data dir>/tower-tracker/game_stats.db
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Directory for log files (defaults to a `logs` folder next to the database)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error or off
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the dashboard to browse, add and analyse entries
    Show,

    /// Record a new entry
    Add(AddArgs),

    /// Print recorded entries
    List {
        /// Only show entries of this run
        #[arg(short, long)]
        run_id: Option<i64>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print average statistics per tier
    Averages,

    /// Delete an entry by id
    Delete {
        /// Entry id
        id: i64,
    },
}

/// Fields of a new entry, as typed by the user
#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Run to add the entry to (defaults to the active run, or a new one)
    #[arg(short, long)]
    pub run_id: Option<i64>,

    /// Tier (must match the run's tier when the run already exists)
    #[arg(short, long)]
    pub tier: Option<String>,

    #[arg(short, long)]
    pub wave: String,

    /// Coins, optionally suffixed with K, M or B (e.g. 17.09M)
    #[arg(short, long)]
    pub coins: String,

    #[arg(long)]
    pub cells: String,

    /// Time spent as hh:mm:ss
    #[arg(long)]
    pub time: String,

    #[arg(short, long)]
    pub notes: Option<String>,

    /// Mark this entry as closing the run
    #[arg(short, long)]
    pub end_of_round: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
}

impl AppConfig {
    /// Resolve paths from CLI flags, the environment and platform defaults
    pub fn from_cli(cli: &Cli) -> Self {
        Self::resolve(
            cli.db_path.clone(),
            std::env::var_os(DB_PATH_ENV).map(PathBuf::from),
            cli.log_dir.clone(),
            &cli.log_level,
        )
    }

    fn resolve(
        db_path: Option<PathBuf>,
        env_db_path: Option<PathBuf>,
        log_dir: Option<PathBuf>,
        log_level: &str,
    ) -> Self {
        let db_path = db_path.or(env_db_path).unwrap_or_else(|| {
            dirs::data_local_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join(DB_FILE_NAME)
        });

        let log_dir = log_dir.unwrap_or_else(|| {
            db_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
                .join("logs")
        });

        AppConfig {
            db_path,
            log_dir,
            log_level: log_level.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::resolve(None, None, None, "info");
        assert!(config.db_path.ends_with("tower-tracker/game_stats.db"));
        assert!(config.log_dir.ends_with("tower-tracker/logs"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_flag_beats_environment() {
        let config = AppConfig::resolve(
            Some(PathBuf::from("/tmp/flag.db")),
            Some(PathBuf::from("/tmp/env.db")),
            None,
            "debug",
        );
        assert_eq!(config.db_path, PathBuf::from("/tmp/flag.db"));
        assert_eq!(config.log_dir, PathBuf::from("/tmp/logs"));

        let config =
            AppConfig::resolve(None, Some(PathBuf::from("/tmp/env.db")), None, "debug");
        assert_eq!(config.db_path, PathBuf::from("/tmp/env.db"));
    }

    #[test]
    fn test_parse_add_command() {
        let cli = Cli::parse_from([
            "tower-tracker",
            "--db-path",
            "/tmp/x.db",
            "add",
            "--wave",
            "120",
            "--coins",
            "17.09M",
            "--cells",
            "340",
            "--time",
            "01:20:00",
            "-e",
        ]);
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/x.db")));
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.coins, "17.09M");
                assert!(args.end_of_round);
                assert!(args.tier.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
