//! `nodewatch report`

use anyhow::Result;

use crate::commands::Context;
use crate::commands::output::{display_table_or, print_json};

pub fn run_report(ctx: &Context, days: u32) -> Result<()> {
    let store = ctx.open_store()?;
    let report = store.status_report(days)?;

    if ctx.is_json() {
        print_json(&report, "status report");
        return Ok(());
    }

    println!("CLUSTER NODE MONITOR - STATUS REPORT");
    println!("Period: Last {} days", report.days);
    println!(
        "Generated: {}",
        report
            .generated
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    println!("\nNode events");
    display_table_or(&report.events, "event groups", "No events recorded");
    println!("\nRecovery attempts");
    display_table_or(&report.recoveries, "groups", "No recovery attempts");
    Ok(())
}
