mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    GoalFlags, LogRequest, NutrientFlags, cmd_delete, cmd_export, cmd_goal_reset, cmd_goal_set,
    cmd_goal_show, cmd_history, cmd_import, cmd_list, cmd_log, cmd_repair, cmd_summary,
};
use crate::config::Config;
use calorie_journal_core::JournalService;

const MAX_HISTORY_DAYS: i64 = 3660;

#[derive(Parser)]
#[command(
    name = "cj",
    version,
    about = "A small offline calorie journal",
    long_about = "Log meals, see daily nutrition totals per meal, and track them against your goals.\nEverything is stored locally."
)]
struct Cli {
    /// Directory holding the journal database
    #[arg(long, global = true, env = "CJ_DATA_DIR", value_name = "PATH")]
    data_dir: Option<PathBuf>,
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a meal: one entry per meal row
    #[command(alias = "add")]
    Log {
        /// What was eaten
        name: String,
        /// Meal for the flag values: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        #[command(flatten)]
        nutrients: NutrientFlags,
        /// Extra meal row, e.g. "lunch:calories=300,protein=20" (repeatable)
        #[arg(long = "row", value_name = "MEAL:KEY=VALUE,...")]
        rows: Vec<String>,
        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
        /// Date to log for (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the daily summary (defaults to today)
    Summary {
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show totals for the last N days
    History {
        /// Number of days to show (1-3660)
        #[arg(
            short,
            long,
            default_value = "7",
            value_parser = clap::value_parser!(u32).range(1..=MAX_HISTORY_DAYS)
        )]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List logged entries, newest first
    List {
        /// Only entries for this date (YYYY-MM-DD or today/yesterday/tomorrow)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an entry by ID (or unique ID prefix)
    Delete {
        /// Entry ID to delete
        entry_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move unreadable stored entries aside so the journal can be written again
    Repair {
        /// Also move aside an entry list that cannot be read at all
        #[arg(long)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage daily nutrition goals
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Export all entries as CSV
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Output as JSON (only with --output)
        #[arg(long)]
        json: bool,
    },
    /// Import entries from a diary CSV (`MyFitnessPal` layout)
    Import {
        /// Path to the CSV file
        file: PathBuf,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Show the active goals
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change one or more goals
    Set {
        #[command(flatten)]
        goals: GoalFlags,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Go back to the default goals
    Reset {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.data_dir)?;
    debug!(data_dir = %config.data_dir.display(), "opening journal");
    let svc = JournalService::open(&config.db_path)?;

    match cli.command {
        Commands::Log {
            name,
            meal,
            nutrients,
            rows,
            notes,
            date,
            json,
        } => cmd_log(
            &svc,
            LogRequest {
                name,
                meal,
                flags: nutrients,
                rows,
                notes,
                date,
            },
            json,
        ),
        Commands::Summary { date, json } => cmd_summary(&svc, date, json),
        Commands::History { days, json } => cmd_history(&svc, days, json),
        Commands::List { date, json } => cmd_list(&svc, date, json),
        Commands::Delete { entry_id, json } => cmd_delete(&svc, &entry_id, json),
        Commands::Repair { force, json } => cmd_repair(&svc, force, json),
        Commands::Goal { command } => match command {
            GoalCommands::Show { json } => cmd_goal_show(&svc, json),
            GoalCommands::Set { goals, json } => cmd_goal_set(&svc, &goals, json),
            GoalCommands::Reset { json } => cmd_goal_reset(&svc, json),
        },
        Commands::Export { output, json } => cmd_export(&svc, output.as_deref(), json),
        Commands::Import {
            file,
            dry_run,
            json,
        } => cmd_import(&svc, &file, dry_run, json),
    }
}
