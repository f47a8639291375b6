// src/cli.rs

//! CLI argument parsing using `clap`.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `loaddag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "loaddag",
    version,
    about = "Stage JSON from object storage into a warehouse and build star-schema tables on a schedule.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `$LOADDAG_CONFIG`, else `Loaddag.toml` in the current
    /// working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LOADDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Validate the config and print the DAG, schedule and intervals; run
    /// nothing.
    Plan,

    /// Create the staging, fact and dimension tables of the song plays
    /// workflow in the warehouse.
    InitSchema,

    /// Run the DAG for one data interval.
    Run {
        /// Logical date (interval start, RFC 3339) of the run. Defaults to
        /// the latest complete interval.
        #[arg(long, value_name = "RFC3339")]
        logical_date: Option<DateTime<Utc>>,
    },

    /// Run every interval of the schedule window in order.
    Backfill {
        /// First logical date to include (default: `start_date`).
        #[arg(long, value_name = "RFC3339")]
        from: Option<DateTime<Utc>>,

        /// Last logical date to include (default: now, capped at `end_date`).
        #[arg(long, value_name = "RFC3339")]
        to: Option<DateTime<Utc>>,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
