//! `nodewatch config`

use anyhow::{Context as _, Result, bail};
use std::fs;
use std::path::PathBuf;

use crate::commands::Context;
use crate::commands::output::print_json;
use crate::config::{ConfigPaths, NodewatchConfig};

#[derive(clap::Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a starter configuration file
    #[command(after_long_help = "\
EXAMPLES:
    nodewatch config init
    nodewatch config init --path ./nodewatch.toml --force
")]
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
        /// Destination (defaults to the user config file)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Check the configuration for errors
    Validate,
}

pub fn handle_config_commands(ctx: &Context, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            if ctx.is_json() {
                print_json(&ctx.config, "configuration");
            } else {
                print!("{}", ctx.config.to_toml()?);
            }
        }
        ConfigCommands::Init { force, path } => {
            let path = match path {
                Some(path) => path.clone(),
                None => ConfigPaths::new()
                    .user
                    .context("Could not determine the user configuration directory")?,
            };
            if path.exists() && !force {
                bail!(
                    "{} already exists; use --force to overwrite",
                    path.display()
                );
            }
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&path, NodewatchConfig::generate_default_config())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote configuration to {}", path.display());
        }
        ConfigCommands::Validate => {
            match &ctx.config_file {
                Some(file) => println!("Configuration file: {}", file.display()),
                None => {
                    let paths = ConfigPaths::new();
                    let existing = paths.existing_paths();
                    if existing.is_empty() {
                        println!("No configuration files found; using defaults");
                    }
                    for p in existing {
                        println!("Configuration file: {}", p.display());
                    }
                }
            }
            if let Err(errors) = ctx.config.validate() {
                for e in &errors {
                    eprintln!("  - {}", e);
                }
                bail!("Configuration has {} error(s)", errors.len());
            }
            println!(
                "Configuration is valid ({} cluster(s))",
                ctx.config.clusters.len()
            );
        }
    }
    Ok(())
}
