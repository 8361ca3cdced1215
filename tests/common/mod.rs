//! Shared fakes for the integration tests.
#![allow(dead_code)]

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use nodewatch::models::{ClusterDescriptor, Event, ExecResult, NodeSnapshot, RecoveryAttempt, Severity};
use nodewatch::monitor::Sleeper;
use nodewatch::notify::Notifier;
use nodewatch::remote::{Connector, RemoteExec};
use nodewatch::store::{EventFilter, EventStore};

/// Replays canned results in order and records every command it was given.
/// Once the script runs out every command fails.
#[derive(Default)]
pub struct ScriptedExec {
    results: RefCell<VecDeque<ExecResult>>,
    pub commands: RefCell<Vec<String>>,
}

impl ScriptedExec {
    pub fn new(results: Vec<ExecResult>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.results.borrow().len()
    }
}

impl RemoteExec for ScriptedExec {
    fn execute(&self, command: &str, _timeout: Duration) -> ExecResult {
        self.commands.borrow_mut().push(command.to_string());
        self.results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| ExecResult::failure(-1, "script exhausted"))
    }

    fn describe(&self, command: &str) -> String {
        format!("fake {}", command)
    }
}

/// Hands out a [`ScriptedExec`] per cluster, in call order
pub struct ScriptedConnector {
    scripts: RefCell<VecDeque<Vec<ExecResult>>>,
    pub connected: RefCell<Vec<String>>,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Vec<ExecResult>>) -> Self {
        Self {
            scripts: RefCell::new(scripts.into()),
            connected: RefCell::new(Vec::new()),
        }
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, cluster: &ClusterDescriptor) -> Box<dyn RemoteExec> {
        self.connected.borrow_mut().push(cluster.name.clone());
        let script = self.scripts.borrow_mut().pop_front().unwrap_or_default();
        Box::new(ScriptedExec::new(script))
    }
}

/// In-memory [`EventStore`]
#[derive(Default)]
pub struct MemoryStore {
    pub snapshots: RefCell<Vec<NodeSnapshot>>,
    pub events: RefCell<Vec<Event>>,
    pub attempts: RefCell<Vec<RecoveryAttempt>>,
    /// Fail every write when set
    pub fail_writes: Cell<bool>,
}

impl MemoryStore {
    pub fn event_kinds(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .map(|e| e.kind.to_string())
            .collect()
    }

    pub fn events_for(&self, node: &str) -> Vec<Event> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.node_name == node)
            .cloned()
            .collect()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.get() {
            bail!("disk full");
        }
        Ok(())
    }
}

impl EventStore for MemoryStore {
    fn record_snapshots(&self, snapshots: &[NodeSnapshot]) -> Result<()> {
        self.check_writable()?;
        self.snapshots.borrow_mut().extend_from_slice(snapshots);
        Ok(())
    }

    fn record_event(&self, event: &Event) -> Result<()> {
        self.check_writable()?;
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }

    fn record_attempt(&self, attempt: &RecoveryAttempt) -> Result<()> {
        self.check_writable()?;
        self.attempts.borrow_mut().push(attempt.clone());
        Ok(())
    }

    fn latest_snapshots(&self, cluster: Option<&str>) -> Result<Vec<NodeSnapshot>> {
        let snapshots = self.snapshots.borrow();
        Ok(snapshots
            .iter()
            .filter(|s| cluster.is_none_or(|c| c == s.cluster))
            .filter(|s| {
                snapshots
                    .iter()
                    .filter(|o| o.cluster == s.cluster)
                    .all(|o| o.timestamp <= s.timestamp)
            })
            .cloned()
            .collect())
    }

    fn events_since(&self, since: DateTime<Utc>, filter: &EventFilter) -> Result<Vec<Event>> {
        Ok(self
            .events
            .borrow()
            .iter()
            .filter(|e| e.timestamp > since && filter.matches(e))
            .cloned()
            .collect())
    }

    fn attempts_since(
        &self,
        since: DateTime<Utc>,
        cluster: Option<&str>,
    ) -> Result<Vec<RecoveryAttempt>> {
        Ok(self
            .attempts
            .borrow()
            .iter()
            .filter(|a| a.timestamp > since && cluster.is_none_or(|c| c == a.cluster))
            .cloned()
            .collect())
    }
}

/// Records requested sleeps without blocking
#[derive(Default)]
pub struct NoopSleeper {
    pub sleeps: RefCell<Vec<Duration>>,
}

impl Sleeper for NoopSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// Captures notifications
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: RefCell<Vec<(String, String, Severity)>>,
    pub fail: Cell<bool>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, subject: &str, body: &str, severity: Severity) -> Result<()> {
        if self.fail.get() {
            bail!("mail relay unreachable");
        }
        self.sent
            .borrow_mut()
            .push((subject.to_string(), body.to_string(), severity));
        Ok(())
    }
}

pub const CHECK_COMMAND: &str = "sinfo -h -N -o \"%N %T\"";

/// A cluster with the given recovery templates and no node filter
pub fn cluster(name: &str, recovery_commands: &[&str]) -> ClusterDescriptor {
    ClusterDescriptor {
        name: name.to_string(),
        user: "installer".to_string(),
        head_node: name.to_string(),
        nodes: Vec::new(),
        check_command: CHECK_COMMAND.to_string(),
        recovery_commands: recovery_commands.iter().map(|s| s.to_string()).collect(),
        problem_states: ["down", "drain", "drng", "fail", "failing", "maint", "unk", "unknown"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

pub fn ok(stdout: &str) -> ExecResult {
    ExecResult::success(stdout)
}

pub fn fail(exit_code: i32, stderr: &str) -> ExecResult {
    ExecResult::failure(exit_code, stderr)
}
