//! One monitoring pass over every configured cluster.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;

use crate::models::{ClusterDescriptor, Event, EventKind, NodeSnapshot, Severity};
use crate::monitor::recovery::{RecoveryOrchestrator, RecoverySettings, Sleeper};
use crate::notify::Notifier;
use crate::remote::{Connector, RemoteExec};
use crate::slurm::parse_node_states;
use crate::store::EventStore;

/// Problem-node count above which a notification is critical
pub const DEFAULT_CRITICAL_THRESHOLD: usize = 3;

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub attempt_recovery: bool,
    pub recovery: RecoverySettings,
    /// Host name recorded in every snapshot
    pub checked_from: String,
    pub critical_threshold: usize,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            attempt_recovery: true,
            recovery: RecoverySettings::default(),
            checked_from: "localhost".to_string(),
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterSummary {
    pub cluster: String,
    /// The status query could not be run
    pub check_failed: bool,
    pub total: usize,
    pub healthy: usize,
    pub problem: usize,
    pub problem_nodes: Vec<String>,
    pub recovered: usize,
    pub failed_recovery: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorSummary {
    pub timestamp: DateTime<Utc>,
    pub clusters: Vec<ClusterSummary>,
    pub total_nodes: usize,
    pub healthy_nodes: usize,
    pub problem_nodes: usize,
    pub recovered_nodes: usize,
    pub failed_recovery: usize,
}

impl MonitorSummary {
    fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            clusters: Vec::new(),
            total_nodes: 0,
            healthy_nodes: 0,
            problem_nodes: 0,
            recovered_nodes: 0,
            failed_recovery: 0,
        }
    }

    fn add(&mut self, cluster: ClusterSummary) {
        self.total_nodes += cluster.total;
        self.healthy_nodes += cluster.healthy;
        self.problem_nodes += cluster.problem;
        self.recovered_nodes += cluster.recovered;
        self.failed_recovery += cluster.failed_recovery;
        self.clusters.push(cluster);
    }
}

/// Checks clusters, records what it sees and drives recovery
pub struct Monitor<'a> {
    connector: &'a dyn Connector,
    store: &'a dyn EventStore,
    sleeper: &'a dyn Sleeper,
    notifier: &'a dyn Notifier,
    options: MonitorOptions,
}

impl<'a> Monitor<'a> {
    pub fn new(
        connector: &'a dyn Connector,
        store: &'a dyn EventStore,
        sleeper: &'a dyn Sleeper,
        notifier: &'a dyn Notifier,
        options: MonitorOptions,
    ) -> Self {
        Self {
            connector,
            store,
            sleeper,
            notifier,
            options,
        }
    }

    /// Monitor each cluster in order. A store failure aborts the whole cycle.
    pub fn run(&self, clusters: &[ClusterDescriptor]) -> Result<MonitorSummary> {
        let mut summary = MonitorSummary::new(Utc::now());
        for cluster in clusters {
            info!("Monitoring cluster={}", cluster.name);
            let exec = self.connector.connect(cluster);
            let cluster_summary = self.monitor_cluster(cluster, exec.as_ref())?;
            summary.add(cluster_summary);
        }
        info!(
            "Monitoring cycle complete total={} healthy={} problem={} recovered={} failed_recovery={}",
            summary.total_nodes,
            summary.healthy_nodes,
            summary.problem_nodes,
            summary.recovered_nodes,
            summary.failed_recovery
        );
        Ok(summary)
    }

    /// Check one cluster, record snapshots and events, and recover problem nodes
    pub fn monitor_cluster(
        &self,
        cluster: &ClusterDescriptor,
        exec: &dyn RemoteExec,
    ) -> Result<ClusterSummary> {
        let mut summary = ClusterSummary {
            cluster: cluster.name.clone(),
            ..Default::default()
        };

        let result = exec.execute(&cluster.check_command, self.options.recovery.command_timeout);
        if !result.ok {
            error!(
                "Failed to check cluster={} exit_code={} stderr={}",
                cluster.name,
                result.exit_code,
                result.stderr.trim()
            );
            self.store.record_event(&Event::now(
                &cluster.name,
                &cluster.head_node,
                EventKind::CheckFailed,
                format!("Failed to run status check: {}", result.stderr.trim()),
                Severity::Error,
            ))?;
            summary.check_failed = true;
            return Ok(summary);
        }

        let checked_at = Utc::now();
        let snapshots: Vec<NodeSnapshot> = parse_node_states(&result.stdout)
            .into_iter()
            .filter(|line| cluster.tracks(&line.node_name))
            .map(|line| {
                NodeSnapshot::observe(
                    &cluster.name,
                    &line.node_name,
                    &line.state,
                    &cluster.problem_states,
                    &self.options.checked_from,
                    checked_at,
                )
            })
            .collect();

        if snapshots.is_empty() {
            error!("No node status data cluster={}", cluster.name);
            return Ok(summary);
        }

        self.store.record_snapshots(&snapshots)?;

        let mut problems = Vec::new();
        for snapshot in &snapshots {
            summary.total += 1;
            if snapshot.is_available() {
                summary.healthy += 1;
                continue;
            }
            summary.problem += 1;
            summary.problem_nodes.push(snapshot.node_name.clone());
            self.store.record_event(&Event::now(
                &cluster.name,
                &snapshot.node_name,
                EventKind::NodeDown,
                format!("Node in problematic state: {}", snapshot.raw_state),
                Severity::Warning,
            ))?;
            problems.push(snapshot);
        }

        info!(
            "Cluster checked cluster={} total={} healthy={} problem={}",
            cluster.name, summary.total, summary.healthy, summary.problem
        );
        if problems.is_empty() {
            return Ok(summary);
        }
        warn!(
            "Problem nodes cluster={} nodes={}",
            cluster.name,
            summary.problem_nodes.join(",")
        );

        if self.options.attempt_recovery {
            let orchestrator = RecoveryOrchestrator::new(
                cluster,
                exec,
                self.store,
                self.sleeper,
                self.options.recovery,
            );
            for snapshot in &problems {
                if orchestrator.recover(&snapshot.node_name)?.recovered() {
                    summary.recovered += 1;
                } else {
                    summary.failed_recovery += 1;
                }
            }
        }

        self.send_notification(cluster, &problems, &summary);
        Ok(summary)
    }

    fn send_notification(
        &self,
        cluster: &ClusterDescriptor,
        problems: &[&NodeSnapshot],
        summary: &ClusterSummary,
    ) {
        let subject = format!("Cluster {}: {} node(s) down", cluster.name, problems.len());
        let node_lines: Vec<String> = problems
            .iter()
            .map(|s| format!("  - {}: {}", s.node_name, s.raw_state))
            .collect();
        let body = format!(
            "Problem nodes detected on {}:\n\n{}\n\nRecovery attempted: {}\nRecovered: {}\nFailed: {}\n",
            cluster.name,
            node_lines.join("\n"),
            self.options.attempt_recovery,
            summary.recovered,
            summary.failed_recovery
        );
        let severity = if problems.len() > self.options.critical_threshold {
            Severity::Critical
        } else {
            Severity::Warning
        };

        if let Err(e) = self.notifier.notify(&subject, &body, severity) {
            error!("Failed to send notification cluster={}: {:#}", cluster.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_totals() {
        let mut summary = MonitorSummary::new(Utc::now());
        summary.add(ClusterSummary {
            cluster: "a".to_string(),
            total: 4,
            healthy: 3,
            problem: 1,
            recovered: 1,
            ..Default::default()
        });
        summary.add(ClusterSummary {
            cluster: "b".to_string(),
            total: 2,
            healthy: 1,
            problem: 1,
            failed_recovery: 1,
            ..Default::default()
        });
        assert_eq!(summary.total_nodes, 6);
        assert_eq!(summary.healthy_nodes, 4);
        assert_eq!(summary.problem_nodes, 2);
        assert_eq!(summary.recovered_nodes, 1);
        assert_eq!(summary.failed_recovery, 1);
        assert_eq!(summary.clusters.len(), 2);
    }
}
