//! `nodewatch db`

use anyhow::Result;

use crate::commands::Context;
use crate::commands::output::print_json;

#[derive(clap::Subcommand)]
pub enum DbCommands {
    /// Show row counts, time range, and file size
    Stats,
    /// Delete records older than the given number of days
    #[command(after_long_help = "\
EXAMPLES:
    nodewatch db cleanup
    nodewatch db cleanup --days 30
")]
    Cleanup {
        /// Keep this many days of history
        #[arg(long, default_value_t = 90)]
        days: u32,
    },
}

fn format_size(bytes: u64) -> String {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    if mb < 1.0 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", mb)
    }
}

pub fn handle_db_commands(ctx: &Context, command: &DbCommands) -> Result<()> {
    let store = ctx.open_store()?;
    match command {
        DbCommands::Stats => {
            let stats = store.database_stats()?;
            if ctx.is_json() {
                print_json(&stats, "database statistics");
                return Ok(());
            }
            println!("Database: {}", ctx.database_path().display());
            println!("  node_status rows:       {}", stats.node_status_rows);
            println!("  node_events rows:       {}", stats.node_events_rows);
            println!("  recovery_attempts rows: {}", stats.recovery_attempts_rows);
            println!(
                "  Oldest record:          {}",
                stats.oldest_record.as_deref().unwrap_or("-")
            );
            println!(
                "  Newest record:          {}",
                stats.newest_record.as_deref().unwrap_or("-")
            );
            if let Some(size) = stats.file_size_bytes {
                println!("  File size:              {}", format_size(size));
            }
        }
        DbCommands::Cleanup { days } => {
            let summary = store.cleanup_older_than(*days)?;
            if ctx.is_json() {
                print_json(&summary, "cleanup summary");
                return Ok(());
            }
            println!("Deleted records older than {} days:", days);
            println!("  node_status:       {}", summary.node_status);
            println!("  node_events:       {}", summary.node_events);
            println!("  recovery_attempts: {}", summary.recovery_attempts);
        }
    }
    Ok(())
}
