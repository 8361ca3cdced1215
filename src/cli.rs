//! Command-line interface definition.

use clap::builder::styling;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::config::ConfigCommands;
use crate::commands::db::DbCommands;
use crate::commands::query::QueryCommands;

const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::Green.on_default().bold())
    .usage(styling::AnsiColor::Green.on_default().bold())
    .literal(styling::AnsiColor::Cyan.on_default().bold())
    .placeholder(styling::AnsiColor::Cyan.on_default());

#[derive(Parser)]
#[command(name = "nodewatch")]
#[command(version, about = "Slurm node health monitoring, recovery, and queue diagnostics")]
#[command(styles = STYLES)]
pub struct Cli {
    /// Configuration file (replaces the standard search locations)
    #[arg(short, long, env = "NODEWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file (overrides monitor.database)
    #[arg(long, env = "NODEWATCH_DB")]
    pub db: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "NODEWATCH_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check every node, record its state, and try to recover problem nodes
    #[command(after_long_help = "\
EXAMPLES:
    nodewatch monitor
    nodewatch monitor --cluster spydur --no-recovery
    nodewatch -f json monitor
")]
    Monitor {
        /// Only monitor this cluster
        #[arg(long)]
        cluster: Option<String>,
        /// Record states without running recovery commands
        #[arg(long)]
        no_recovery: bool,
    },
    /// Find pending jobs whose DOWN/DRAIN reason does not match the nodes
    #[command(after_long_help = "\
EXAMPLES:
    nodewatch queue
    nodewatch queue --cluster arachne --verbose
")]
    Queue {
        /// Only check this cluster
        #[arg(long)]
        cluster: Option<String>,
        /// Show per-node resource details
        #[arg(short, long)]
        verbose: bool,
    },
    /// Summarize problem events and recovery attempts
    Report {
        /// Days to include
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Query the monitoring history
    #[command(after_long_help = "\
EXAMPLES:
    nodewatch query current --cluster spydur
    nodewatch query problems --days 1
    nodewatch query events --node spdr07 --problems-only
    nodewatch -f json query node-detail spydur spdr07
")]
    Query {
        #[command(subcommand)]
        command: QueryCommands,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Show, create, or validate configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}
