use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "b3futures")]
#[command(version, about = "B3 futures settlement price collector and analyzer")]
#[command(
    long_about = "Collect the daily settlement prices published by B3 for listed futures into an append-only SQLite archive, query it, and render interactive charts."
)]
pub struct Cli {
    /// SQLite store (overrides B3FUTURES_DB and the config file)
    #[arg(long = "db", global = true)]
    pub db: Option<PathBuf>,

    /// Config file (default: <config dir>/b3futures/config.toml)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download today's settlement page and append it to the store
    Collect {
        /// Parse a saved copy of the page instead of downloading it
        #[arg(long)]
        html_file: Option<PathBuf>,

        /// Preview only, don't save to database
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show the most recent settlement snapshot
    Latest {
        /// One row per contract, collapsing same-day re-runs to the newest
        #[arg(long)]
        per_contract: bool,
    },

    /// Recent rows for a commodity (case-insensitive substring match)
    History {
        /// Commodity name or code, e.g. DI1
        commodity: String,

        /// Number of calendar days to look back
        #[arg(short, long, default_value_t = crate::query::DEFAULT_HISTORY_DAYS)]
        days: i64,
    },

    /// Dump the archive, newest batch first
    Extract {
        /// First download date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Last download date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Write rows to a CSV file instead of printing them
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Run a read-only SQL statement against the store
    Query {
        /// SQL text, e.g. "SELECT * FROM all_futures LIMIT 5"
        sql: String,
    },

    /// List commodities in the archive
    Commodities,

    /// List scrape batches in the archive
    Batches,

    /// Render interactive charts from the archive
    Analyze {
        /// Restrict to one commodity (substring match)
        #[arg(short, long)]
        commodity: Option<String>,

        /// Days of history when a commodity is given
        #[arg(short, long, default_value_t = crate::query::DEFAULT_HISTORY_DAYS)]
        days: i64,

        /// Git working copy to pull before analyzing
        #[arg(long)]
        repo: Option<PathBuf>,

        /// Build charts without writing HTML files
        #[arg(long)]
        no_save: bool,

        /// Directory for chart files (default from config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}
