//! Subcommand handlers for the nodewatch binary.

pub mod config;
pub mod db;
pub mod monitor;
pub mod output;
pub mod query;
pub mod queue;
pub mod report;

use anyhow::{Result, bail};
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{Cli, Commands};
use crate::config::NodewatchConfig;
use crate::logging;
use crate::remote::{SshConnector, SshOptions};
use crate::store::SqliteStore;

/// Settings resolved from the command line and configuration files
pub struct Context {
    pub config: NodewatchConfig,
    pub format: String,
    /// Explicit `--config` file, if any
    pub config_file: Option<PathBuf>,
    db_override: Option<PathBuf>,
}

impl Context {
    pub fn new(config: NodewatchConfig, format: &str) -> Self {
        Self {
            config,
            format: format.to_string(),
            config_file: None,
            db_override: None,
        }
    }

    pub fn with_database(mut self, path: Option<PathBuf>) -> Self {
        self.db_override = path;
        self
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }

    pub fn database_path(&self) -> PathBuf {
        self.db_override
            .clone()
            .unwrap_or_else(|| self.config.monitor.database_path())
    }

    pub fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.database_path())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.config.monitor.command_timeout_secs)
    }

    pub fn connector(&self) -> SshConnector {
        SshConnector::new(SshOptions {
            binary: self.config.monitor.ssh_binary.clone(),
            connect_timeout_secs: self.config.monitor.ssh_connect_timeout_secs,
        })
    }
}

/// Load an explicit config file, or merge the standard locations
pub fn load_config(config_file: Option<&Path>) -> Result<NodewatchConfig> {
    match config_file {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            NodewatchConfig::load_from_files(&[path.to_path_buf()])
        }
        None => NodewatchConfig::load(),
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.monitor.log_level.clone());
    logging::init(&level, config.monitor.log_file.as_deref())?;

    let mut ctx = Context::new(config, &cli.format).with_database(cli.db.clone());
    ctx.config_file = cli.config.clone();
    debug!("Using database {}", ctx.database_path().display());

    // `config` must work even when the configuration is broken
    if !matches!(cli.command, Commands::Config { .. })
        && let Err(errors) = ctx.config.validate()
    {
        bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }

    match &cli.command {
        Commands::Monitor {
            cluster,
            no_recovery,
        } => monitor::run_monitor(&ctx, cluster.as_deref(), !*no_recovery),
        Commands::Queue { cluster, verbose } => {
            queue::run_queue(&ctx, cluster.as_deref(), *verbose)
        }
        Commands::Report { days } => report::run_report(&ctx, *days),
        Commands::Query { command } => query::handle_query_commands(&ctx, command),
        Commands::Db { command } => db::handle_db_commands(&ctx, command),
        Commands::Config { command } => config::handle_config_commands(&ctx, command),
    }
}
