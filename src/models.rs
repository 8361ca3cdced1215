//! Domain records shared by the monitoring and queue diagnostic engines.
//!
//! Snapshots, events and recovery attempts are immutable facts that get appended
//! to the event store. Pending jobs and resource samples are transient and are
//! rebuilt from scheduler output on every diagnostic cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::monitor::classifier::{Availability, classify};

/// Placeholder substituted with the target node name in recovery command templates
pub const NODE_PLACEHOLDER: &str = "{node}";

/// Immutable description of one managed cluster, built once from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDescriptor {
    /// Cluster identifier (e.g. "spydur")
    pub name: String,
    /// Management user used for SSH to the head node
    pub user: String,
    /// Head node address; every remote command is routed through it
    pub head_node: String,
    /// Known node names. When non-empty, only these nodes are monitored.
    pub nodes: Vec<String>,
    /// Status query printing `<node> <state>` lines
    pub check_command: String,
    /// Ordered recovery command templates containing `{node}`
    pub recovery_commands: Vec<String>,
    /// State substrings that mark a node as unavailable
    pub problem_states: Vec<String>,
}

impl ClusterDescriptor {
    /// Instantiate a recovery template for a node
    pub fn recovery_command_for(template: &str, node: &str) -> String {
        template.replace(NODE_PLACEHOLDER, node)
    }

    /// Whether the node should be considered by a monitoring cycle
    pub fn tracks(&self, node: &str) -> bool {
        self.nodes.is_empty() || self.nodes.iter().any(|n| n == node)
    }
}

/// One node's observed state at a point in time.
///
/// Only [`NodeSnapshot::observe`] and the store can build one, so availability
/// always follows the classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub cluster: String,
    pub node_name: String,
    pub timestamp: DateTime<Utc>,
    pub raw_state: String,
    available: bool,
    pub checked_from: String,
}

impl NodeSnapshot {
    /// Build a snapshot, deriving availability from the raw state
    pub fn observe(
        cluster: &str,
        node_name: &str,
        raw_state: &str,
        problem_states: &[String],
        checked_from: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let available = classify(raw_state, problem_states) == Availability::Available;
        Self {
            cluster: cluster.to_string(),
            node_name: node_name.to_string(),
            timestamp,
            raw_state: raw_state.to_string(),
            available,
            checked_from: checked_from.to_string(),
        }
    }

    /// Rebuild a snapshot read back from storage
    pub(crate) fn from_stored(
        cluster: String,
        node_name: String,
        timestamp: DateTime<Utc>,
        raw_state: String,
        available: bool,
        checked_from: String,
    ) -> Self {
        Self {
            cluster,
            node_name,
            timestamp,
            raw_state,
            available,
            checked_from,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Value of the `status` column
    pub fn status_label(&self) -> &'static str {
        if self.available { "ok" } else { "problem" }
    }
}

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Severities counted as problems by the reports
    pub fn is_problem(&self) -> bool {
        *self != Severity::Info
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            other => Err(anyhow::anyhow!("Unknown severity: {}", other)),
        }
    }
}

/// Kinds of events written to the audit trail
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NodeDown,
    CheckFailed,
    RecoveryStarted,
    /// A recovery command succeeded and the node is being re-checked
    RecoveryVerifying,
    /// The re-check still found the node unavailable
    RecoveryRetry,
    RecoverySuccessful,
    RecoveryFailed,
    /// Event types written by other tools sharing the database
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::NodeDown => "node_down",
            EventKind::CheckFailed => "check_failed",
            EventKind::RecoveryStarted => "recovery_started",
            EventKind::RecoveryVerifying => "recovery_verifying",
            EventKind::RecoveryRetry => "recovery_retry",
            EventKind::RecoverySuccessful => "recovery_successful",
            EventKind::RecoveryFailed => "recovery_failed",
            EventKind::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "node_down" => EventKind::NodeDown,
            "check_failed" => EventKind::CheckFailed,
            "recovery_started" => EventKind::RecoveryStarted,
            "recovery_verifying" => EventKind::RecoveryVerifying,
            "recovery_retry" => EventKind::RecoveryRetry,
            "recovery_successful" => EventKind::RecoverySuccessful,
            "recovery_failed" => EventKind::RecoveryFailed,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub cluster: String,
    pub node_name: String,
    pub kind: EventKind,
    pub details: String,
    pub severity: Severity,
}

impl Event {
    pub fn now(
        cluster: &str,
        node_name: &str,
        kind: EventKind,
        details: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            cluster: cluster.to_string(),
            node_name: node_name.to_string(),
            kind,
            details: details.into(),
            severity,
        }
    }
}

/// One executed recovery command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub timestamp: DateTime<Utc>,
    pub cluster: String,
    pub node_name: String,
    pub command: String,
    pub exit_code: Option<i32>,
    pub output: String,
    pub success: bool,
}

/// Outcome of a remote command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub ok: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    /// Exit code used for timeouts and commands that could not be started
    pub const SYNTHETIC_FAILURE: i32 = -1;

    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            ok: true,
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            ok: false,
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// A pending job as reported by `squeue`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingJob {
    pub job_id: String,
    pub partition: String,
    pub name: String,
    pub user: String,
    pub reason: String,
    pub nodelist: String,
}

/// Resource figures for one node as reported by `scontrol show node`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeResourceSample {
    pub node_name: String,
    pub state: String,
    pub cpus_total: u32,
    pub cpus_alloc: u32,
    pub mem_total_mb: u64,
    pub mem_alloc_mb: u64,
    pub gpus_total: u32,
}

impl NodeResourceSample {
    pub fn new(node_name: &str) -> Self {
        Self {
            node_name: node_name.to_string(),
            state: "unknown".to_string(),
            cpus_total: 0,
            cpus_alloc: 0,
            mem_total_mb: 0,
            mem_alloc_mb: 0,
            gpus_total: 0,
        }
    }

    pub fn cpus_free(&self) -> i64 {
        self.cpus_total as i64 - self.cpus_alloc as i64
    }

    pub fn mem_free_mb(&self) -> i64 {
        self.mem_total_mb as i64 - self.mem_alloc_mb as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem_states() -> Vec<String> {
        vec!["down".to_string(), "drain".to_string()]
    }

    #[test]
    fn test_snapshot_availability_is_derived() {
        let now = Utc::now();
        let idle = NodeSnapshot::observe("c", "n1", "idle", &problem_states(), "ctl", now);
        let drained = NodeSnapshot::observe("c", "n2", "DRAINING", &problem_states(), "ctl", now);
        assert!(idle.is_available());
        assert_eq!(idle.status_label(), "ok");
        assert!(!drained.is_available());
        assert_eq!(drained.status_label(), "problem");
    }

    trait Fallback {
        const DESERIALIZABLE: bool = false;
    }

    struct Deserializable<T>(std::marker::PhantomData<T>);

    impl<T> Fallback for Deserializable<T> {}

    impl<T: serde::de::DeserializeOwned> Deserializable<T> {
        const DESERIALIZABLE: bool = true;
    }

    #[test]
    fn test_snapshot_cannot_be_deserialized() {
        // Deserializing would let `available` disagree with `raw_state`
        assert!(Deserializable::<Severity>::DESERIALIZABLE);
        assert!(!Deserializable::<NodeSnapshot>::DESERIALIZABLE);
    }

    #[test]
    fn test_serialized_snapshot_reports_derived_availability() {
        let snapshot =
            NodeSnapshot::observe("c", "n1", "down*", &problem_states(), "ctl", Utc::now());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["raw_state"], "down*");
        assert_eq!(value["available"], false);
    }

    #[test]
    fn test_recovery_command_for() {
        let cmd = ClusterDescriptor::recovery_command_for(
            "sudo scontrol update nodename={node} state=resume",
            "spdr07",
        );
        assert_eq!(cmd, "sudo scontrol update nodename=spdr07 state=resume");
    }

    #[test]
    fn test_event_kind_roundtrip() {
        for kind in [
            EventKind::NodeDown,
            EventKind::CheckFailed,
            EventKind::RecoveryStarted,
            EventKind::RecoveryVerifying,
            EventKind::RecoveryRetry,
            EventKind::RecoverySuccessful,
            EventKind::RecoveryFailed,
        ] {
            assert_eq!(EventKind::parse(kind.as_str()), kind);
        }
        assert_eq!(
            EventKind::parse("manual_note"),
            EventKind::Other("manual_note".to_string())
        );
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("loud".parse::<Severity>().is_err());
        assert!(!Severity::Info.is_problem());
        assert!(Severity::Error.is_problem());
    }
}
