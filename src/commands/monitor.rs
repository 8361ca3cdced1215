//! `nodewatch monitor`

use anyhow::Result;
use std::time::Duration;
use tabled::Tabled;

use crate::commands::Context;
use crate::commands::output::{display_table_with_count, print_json};
use crate::monitor::{ClusterSummary, Monitor, MonitorOptions, RecoverySettings, ThreadSleeper};
use crate::notify::{LogNotifier, Notifier, SendmailNotifier};

#[derive(Tabled)]
struct ClusterSummaryRow {
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Total")]
    total: usize,
    #[tabled(rename = "Healthy")]
    healthy: usize,
    #[tabled(rename = "Problems")]
    problem: usize,
    #[tabled(rename = "Recovered")]
    recovered: usize,
    #[tabled(rename = "Failed Recovery")]
    failed_recovery: usize,
    #[tabled(rename = "Problem Nodes")]
    problem_nodes: String,
}

impl From<&ClusterSummary> for ClusterSummaryRow {
    fn from(summary: &ClusterSummary) -> Self {
        Self {
            cluster: summary.cluster.clone(),
            total: summary.total,
            healthy: summary.healthy,
            problem: summary.problem,
            recovered: summary.recovered,
            failed_recovery: summary.failed_recovery,
            problem_nodes: if summary.check_failed {
                "(check failed)".to_string()
            } else {
                summary.problem_nodes.join(",")
            },
        }
    }
}

/// Build the configured notifier
pub fn notifier(ctx: &Context) -> Box<dyn Notifier> {
    let notification = &ctx.config.notification;
    if notification.enabled {
        Box::new(SendmailNotifier {
            sendmail_binary: notification.sendmail_binary.clone(),
            from: notification.from.clone(),
            to: notification.to.clone(),
            control_host: ctx.config.monitor.control_host(),
        })
    } else {
        Box::new(LogNotifier)
    }
}

pub fn run_monitor(ctx: &Context, cluster: Option<&str>, attempt_recovery: bool) -> Result<()> {
    let clusters = ctx.config.cluster_descriptors(cluster)?;
    let store = ctx.open_store()?;
    let connector = ctx.connector();
    let notifier = notifier(ctx);

    let options = MonitorOptions {
        attempt_recovery,
        recovery: RecoverySettings {
            wait: Duration::from_secs(ctx.config.monitor.recovery_wait_secs),
            command_timeout: ctx.command_timeout(),
        },
        checked_from: ctx.config.monitor.control_host(),
        critical_threshold: ctx.config.notification.critical_threshold,
    };

    let monitor = Monitor::new(
        &connector,
        &store,
        &ThreadSleeper,
        notifier.as_ref(),
        options,
    );
    let summary = monitor.run(&clusters)?;

    if ctx.is_json() {
        print_json(&summary, "monitor summary");
        return Ok(());
    }

    let rows: Vec<ClusterSummaryRow> = summary.clusters.iter().map(Into::into).collect();
    display_table_with_count(&rows, "clusters");
    println!(
        "Nodes: {} total, {} healthy, {} problem, {} recovered, {} failed recovery",
        summary.total_nodes,
        summary.healthy_nodes,
        summary.problem_nodes,
        summary.recovered_nodes,
        summary.failed_recovery
    );
    Ok(())
}
