//! Command-line definitions for the `club-loader` binary

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{DEFAULT_SCHEMA, ENV_SCHEMA};
use crate::db::DEFAULT_DATABASE_URL;
use crate::source::delimiter_byte;

/// Idempotent CSV loader for the club analytics warehouse
#[derive(Parser, Debug)]
#[command(name = "club-loader")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// PostgreSQL connection string
    #[arg(
        long,
        alias = "connection-string",
        env = "DATABASE_URL",
        default_value = DEFAULT_DATABASE_URL,
        global = true
    )]
    pub database_url: String,

    /// Print load results as JSON instead of a summary
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load one delimited file into a table
    Load {
        /// Path to the CSV file
        #[arg(long)]
        csv_path: PathBuf,

        /// Destination table, optionally schema-qualified
        #[arg(long)]
        target_table: String,

        /// Schema used when the target table has none
        #[arg(long, env = ENV_SCHEMA, default_value = DEFAULT_SCHEMA)]
        schema: String,

        /// Conflict key column
        #[arg(long)]
        primary_key: String,

        /// Columns overwritten on conflict (default: all but the key)
        #[arg(long, num_args = 1..)]
        update_columns: Option<Vec<String>>,

        /// Field delimiter, a single ASCII character other than `"`
        #[arg(long, default_value = ",", value_parser = parse_delimiter)]
        delimiter: u8,
    },

    /// Load every feed generated for one day
    Daily {
        /// TOML load plan (default: tickets and dues into the raw schema)
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Day to load, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Directory holding the daily files, overrides the plan's
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => delimiter_byte(c)
            .ok_or_else(|| format!("unsupported delimiter {:?}", c)),
        _ => Err(format!("delimiter must be one character, got {:?}", value)),
    }
}
