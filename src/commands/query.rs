//! `nodewatch query`

use anyhow::Result;
use tabled::Tabled;

use crate::commands::Context;
use crate::commands::output::{display_table_or, print_json};
use crate::models::{Event, NodeSnapshot, RecoveryAttempt};
use crate::store::reports::cutoff;
use crate::store::{EventFilter, EventStore};

#[derive(clap::Subcommand)]
pub enum QueryCommands {
    /// List every node that has been observed
    ListNodes {
        #[arg(long)]
        cluster: Option<String>,
    },
    /// Node states from the most recent check
    Current {
        #[arg(long)]
        cluster: Option<String>,
    },
    /// Warning, error and critical events
    Problems {
        #[arg(long, default_value_t = 7)]
        days: u32,
        #[arg(long)]
        cluster: Option<String>,
    },
    /// All events, oldest first
    Events {
        #[arg(long, default_value_t = 7)]
        days: u32,
        #[arg(long)]
        cluster: Option<String>,
        #[arg(long)]
        node: Option<String>,
        /// Skip informational events
        #[arg(long)]
        problems_only: bool,
    },
    /// Recovery commands that were executed, oldest first
    Attempts {
        #[arg(long, default_value_t = 7)]
        days: u32,
        #[arg(long)]
        cluster: Option<String>,
    },
    /// Recovery success counts per node and command
    RecoveryStats {
        #[arg(long, default_value_t = 30)]
        days: u32,
        #[arg(long)]
        cluster: Option<String>,
    },
    /// Share of checks each node spent unavailable
    Downtime {
        #[arg(long, default_value_t = 30)]
        days: u32,
        #[arg(long)]
        cluster: Option<String>,
    },
    /// Event and recovery history of one node
    NodeDetail {
        cluster: String,
        node: String,
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Per-cluster health from the latest check
    Health,
}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Node")]
    node_name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Checked")]
    checked: String,
}

impl From<&NodeSnapshot> for SnapshotRow {
    fn from(s: &NodeSnapshot) -> Self {
        Self {
            cluster: s.cluster.clone(),
            node_name: s.node_name.clone(),
            state: s.raw_state.clone(),
            status: s.status_label().to_string(),
            checked: local_time(&s.timestamp),
        }
    }
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Node")]
    node_name: String,
    #[tabled(rename = "Event")]
    kind: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Details")]
    details: String,
}

impl From<&Event> for EventRow {
    fn from(e: &Event) -> Self {
        Self {
            time: local_time(&e.timestamp),
            cluster: e.cluster.clone(),
            node_name: e.node_name.clone(),
            kind: e.kind.to_string(),
            severity: e.severity.to_string(),
            details: e.details.clone(),
        }
    }
}

#[derive(Tabled)]
struct AttemptRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Node")]
    node_name: String,
    #[tabled(rename = "Command")]
    command: String,
    #[tabled(rename = "Exit")]
    exit_code: String,
    #[tabled(rename = "Success")]
    success: bool,
}

impl From<&RecoveryAttempt> for AttemptRow {
    fn from(a: &RecoveryAttempt) -> Self {
        Self {
            time: local_time(&a.timestamp),
            cluster: a.cluster.clone(),
            node_name: a.node_name.clone(),
            command: a.command.clone(),
            exit_code: a
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            success: a.success,
        }
    }
}

fn local_time(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn print_events(ctx: &Context, events: &[Event], empty_message: &str) {
    if ctx.is_json() {
        print_json(&events, "events");
    } else {
        let rows: Vec<EventRow> = events.iter().map(Into::into).collect();
        display_table_or(&rows, "events", empty_message);
    }
}

fn print_attempts(ctx: &Context, attempts: &[RecoveryAttempt]) {
    if ctx.is_json() {
        print_json(&attempts, "recovery attempts");
    } else {
        let rows: Vec<AttemptRow> = attempts.iter().map(Into::into).collect();
        display_table_or(&rows, "attempts", "No recovery attempts found");
    }
}

pub fn handle_query_commands(ctx: &Context, command: &QueryCommands) -> Result<()> {
    let store = ctx.open_store()?;
    match command {
        QueryCommands::ListNodes { cluster } => {
            let rows = store.list_nodes(cluster.as_deref())?;
            if ctx.is_json() {
                print_json(&rows, "nodes");
            } else {
                display_table_or(&rows, "nodes", "No nodes recorded");
            }
        }
        QueryCommands::Current { cluster } => {
            let snapshots = store.latest_snapshots(cluster.as_deref())?;
            if ctx.is_json() {
                print_json(&snapshots, "snapshots");
            } else {
                let rows: Vec<SnapshotRow> = snapshots.iter().map(Into::into).collect();
                display_table_or(&rows, "nodes", "No status data recorded");
            }
        }
        QueryCommands::Problems { days, cluster } => {
            let events = store.problem_history(*days, cluster.as_deref())?;
            print_events(
                ctx,
                &events,
                &format!("No problems in the last {} days", days),
            );
        }
        QueryCommands::Events {
            days,
            cluster,
            node,
            problems_only,
        } => {
            let filter = EventFilter {
                cluster: cluster.clone(),
                node_name: node.clone(),
                problems_only: *problems_only,
            };
            let events = store.events_since(cutoff(*days), &filter)?;
            print_events(ctx, &events, "No events found");
        }
        QueryCommands::Attempts { days, cluster } => {
            let attempts = store.attempts_since(cutoff(*days), cluster.as_deref())?;
            print_attempts(ctx, &attempts);
        }
        QueryCommands::RecoveryStats { days, cluster } => {
            let rows = store.recovery_stats(*days, cluster.as_deref())?;
            if ctx.is_json() {
                print_json(&rows, "recovery statistics");
            } else {
                display_table_or(&rows, "rows", "No recovery attempts found");
            }
        }
        QueryCommands::Downtime { days, cluster } => {
            let rows = store.downtime_stats(*days, cluster.as_deref())?;
            if ctx.is_json() {
                print_json(&rows, "downtime statistics");
            } else {
                display_table_or(
                    &rows,
                    "nodes",
                    &format!("No downtime in the last {} days", days),
                );
            }
        }
        QueryCommands::NodeDetail {
            cluster,
            node,
            days,
        } => {
            let detail = store.node_detail(cluster, node, *days)?;
            if ctx.is_json() {
                print_json(&detail, "node detail");
                return Ok(());
            }
            println!("Node {}/{} (last {} days)", cluster, node, days);
            println!("\nEvents");
            let rows: Vec<EventRow> = detail.events.iter().map(Into::into).collect();
            display_table_or(&rows, "events", "No events");
            println!("\nRecovery attempts");
            print_attempts(ctx, &detail.attempts);
        }
        QueryCommands::Health => {
            let rows = store.health_summary()?;
            if ctx.is_json() {
                print_json(&rows, "health summary");
            } else {
                display_table_or(&rows, "clusters", "No status data recorded");
            }
        }
    }
    Ok(())
}
