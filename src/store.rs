//! Append-only persistence of snapshots, events and recovery attempts.

pub mod reports;
pub mod sqlite;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{Event, NodeSnapshot, RecoveryAttempt};

pub use sqlite::SqliteStore;

/// Narrows an event query
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub cluster: Option<String>,
    pub node_name: Option<String>,
    /// Only warning, error and critical events
    pub problems_only: bool,
}

impl EventFilter {
    pub fn for_cluster(cluster: Option<&str>) -> Self {
        Self {
            cluster: cluster.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.cluster.as_ref().is_none_or(|c| *c == event.cluster)
            && self.node_name.as_ref().is_none_or(|n| *n == event.node_name)
            && (!self.problems_only || event.severity.is_problem())
    }
}

/// Storage used by the monitoring cycle and recovery episodes.
///
/// Every write is a plain insert; replaying a write appends a duplicate row.
/// Write failures are returned to the caller and abort the current cycle.
pub trait EventStore {
    fn record_snapshots(&self, snapshots: &[NodeSnapshot]) -> Result<()>;

    fn record_event(&self, event: &Event) -> Result<()>;

    fn record_attempt(&self, attempt: &RecoveryAttempt) -> Result<()>;

    /// All snapshots taken at each cluster's most recent check
    fn latest_snapshots(&self, cluster: Option<&str>) -> Result<Vec<NodeSnapshot>>;

    /// Events newer than `since`, oldest first
    fn events_since(&self, since: DateTime<Utc>, filter: &EventFilter) -> Result<Vec<Event>>;

    /// Recovery attempts newer than `since`, oldest first
    fn attempts_since(
        &self,
        since: DateTime<Utc>,
        cluster: Option<&str>,
    ) -> Result<Vec<RecoveryAttempt>>;
}
