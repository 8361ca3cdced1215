//! Recovery episodes for unavailable nodes.
//!
//! An episode walks a cluster's recovery command templates in order:
//!
//! ```text
//! Detected -> Recovering -> Verifying -> Recovered
//!                 ^             |
//!                 +-------------+   (re-check still unavailable, next template)
//!             Recovering -> ExhaustedAttempts   (no template left)
//! ```
//!
//! Every transition emits exactly one event and every executed command is
//! recorded as a [`RecoveryAttempt`].

use anyhow::Result;
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::thread;
use std::time::Duration;

use crate::models::{ClusterDescriptor, Event, EventKind, ExecResult, RecoveryAttempt, Severity};
use crate::monitor::classifier::classify;
use crate::remote::RemoteExec;
use crate::slurm::parse_node_states;
use crate::store::EventStore;

/// Grace period between a successful recovery command and the re-check
pub const DEFAULT_RECOVERY_WAIT: Duration = Duration::from_secs(10);

/// Waits between a recovery command and its verification
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryState {
    Detected,
    Recovering,
    Verifying,
    Recovered,
    ExhaustedAttempts,
}

impl RecoveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecoveryState::Recovered | RecoveryState::ExhaustedAttempts
        )
    }
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecoveryState::Detected => "detected",
            RecoveryState::Recovering => "recovering",
            RecoveryState::Verifying => "verifying",
            RecoveryState::Recovered => "recovered",
            RecoveryState::ExhaustedAttempts => "exhausted_attempts",
        };
        f.write_str(s)
    }
}

/// Result of one recovery episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryOutcome {
    pub node: String,
    pub final_state: RecoveryState,
    /// Number of recovery commands executed
    pub attempts: usize,
    /// Instantiated command that brought the node back
    pub recovered_by: Option<String>,
}

impl RecoveryOutcome {
    pub fn recovered(&self) -> bool {
        self.final_state == RecoveryState::Recovered
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecoverySettings {
    /// Wait before re-checking a node after a successful command
    pub wait: Duration,
    /// Timeout for each recovery command and re-check
    pub command_timeout: Duration,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            wait: DEFAULT_RECOVERY_WAIT,
            command_timeout: Duration::from_secs(30),
        }
    }
}

/// Drives recovery episodes for nodes of one cluster
pub struct RecoveryOrchestrator<'a> {
    cluster: &'a ClusterDescriptor,
    exec: &'a dyn RemoteExec,
    store: &'a dyn EventStore,
    sleeper: &'a dyn Sleeper,
    settings: RecoverySettings,
}

impl<'a> RecoveryOrchestrator<'a> {
    pub fn new(
        cluster: &'a ClusterDescriptor,
        exec: &'a dyn RemoteExec,
        store: &'a dyn EventStore,
        sleeper: &'a dyn Sleeper,
        settings: RecoverySettings,
    ) -> Self {
        Self {
            cluster,
            exec,
            store,
            sleeper,
            settings,
        }
    }

    /// Run one recovery episode for a node the caller has found unavailable.
    ///
    /// Command failures only advance to the next template. Store failures
    /// abort the episode.
    pub fn recover(&self, node: &str) -> Result<RecoveryOutcome> {
        RecoveryEpisode::new(self, node).run()
    }

    /// Re-run the status query and classify only `node`.
    ///
    /// A failed query or a node missing from the output counts as unavailable.
    fn verify(&self, node: &str) -> bool {
        let result = self
            .exec
            .execute(&self.cluster.check_command, self.settings.command_timeout);
        if !result.ok {
            warn!(
                "Re-check failed cluster={} node={} exit_code={} stderr={}",
                self.cluster.name,
                node,
                result.exit_code,
                result.stderr.trim()
            );
            return false;
        }

        match parse_node_states(&result.stdout)
            .into_iter()
            .find(|line| line.node_name == node)
        {
            Some(line) => classify(&line.state, &self.cluster.problem_states).is_available(),
            None => {
                warn!(
                    "Node missing from re-check cluster={} node={}",
                    self.cluster.name, node
                );
                false
            }
        }
    }
}

struct RecoveryEpisode<'o, 'a> {
    orchestrator: &'o RecoveryOrchestrator<'a>,
    node: String,
    state: RecoveryState,
    attempts: usize,
}

impl<'o, 'a> RecoveryEpisode<'o, 'a> {
    fn new(orchestrator: &'o RecoveryOrchestrator<'a>, node: &str) -> Self {
        Self {
            orchestrator,
            node: node.to_string(),
            state: RecoveryState::Detected,
            attempts: 0,
        }
    }

    fn cluster(&self) -> &ClusterDescriptor {
        self.orchestrator.cluster
    }

    /// Move to `next` and record the event for that edge
    fn transition(&mut self, next: RecoveryState, details: String) -> Result<()> {
        debug!(
            "Recovery transition cluster={} node={} from={} to={}",
            self.cluster().name,
            self.node,
            self.state,
            next
        );
        let edge = transition_event(self.state, next);
        self.state = next;
        match edge {
            Some((kind, severity)) => self.emit(kind, details, severity),
            None => {
                warn!(
                    "Unexpected recovery transition cluster={} node={} to={}",
                    self.cluster().name,
                    self.node,
                    next
                );
                Ok(())
            }
        }
    }

    fn emit(&self, kind: EventKind, details: String, severity: Severity) -> Result<()> {
        let event = Event::now(&self.cluster().name, &self.node, kind, details, severity);
        self.orchestrator.store.record_event(&event)
    }

    fn run(mut self) -> Result<RecoveryOutcome> {
        info!(
            "Recovery started cluster={} node={}",
            self.cluster().name,
            self.node
        );
        self.transition(
            RecoveryState::Recovering,
            "Starting recovery procedures".to_string(),
        )?;

        let cluster = self.orchestrator.cluster;
        for template in &cluster.recovery_commands {
            let command = ClusterDescriptor::recovery_command_for(template, &self.node);
            if !self.attempt(&command)? {
                continue;
            }

            self.transition(
                RecoveryState::Verifying,
                format!("Re-checking node after: {}", command),
            )?;
            self.orchestrator.sleeper.sleep(self.orchestrator.settings.wait);

            if self.orchestrator.verify(&self.node) {
                info!(
                    "Node recovered cluster={} node={} command={}",
                    self.cluster().name,
                    self.node,
                    command
                );
                self.transition(
                    RecoveryState::Recovered,
                    format!("Node recovered using: {}", command),
                )?;
                return Ok(self.finish(Some(command)));
            }

            info!(
                "Node still unavailable after command cluster={} node={} command={}",
                self.cluster().name,
                self.node,
                command
            );
            self.transition(
                RecoveryState::Recovering,
                format!("Node still unavailable after: {}", command),
            )?;
        }

        warn!(
            "All recovery attempts failed cluster={} node={} attempts={}",
            self.cluster().name,
            self.node,
            self.attempts
        );
        self.transition(
            RecoveryState::ExhaustedAttempts,
            "All recovery attempts failed".to_string(),
        )?;
        Ok(self.finish(None))
    }

    /// Execute one instantiated command and record it. Returns whether it succeeded.
    fn attempt(&mut self, command: &str) -> Result<bool> {
        let exec = self.orchestrator.exec;
        info!(
            "Executing recovery command cluster={} node={} command={}",
            self.cluster().name,
            self.node,
            exec.describe(command)
        );

        let result = exec.execute(command, self.orchestrator.settings.command_timeout);
        self.attempts += 1;

        let attempt = RecoveryAttempt {
            timestamp: Utc::now(),
            cluster: self.cluster().name.clone(),
            node_name: self.node.clone(),
            command: exec.describe(command),
            exit_code: Some(result.exit_code),
            output: combined_output(&result),
            success: result.ok,
        };
        self.orchestrator.store.record_attempt(&attempt)?;

        if !result.ok {
            warn!(
                "Recovery command failed cluster={} node={} exit_code={} stderr={}",
                self.cluster().name,
                self.node,
                result.exit_code,
                result.stderr.trim()
            );
        }
        Ok(result.ok)
    }

    fn finish(self, recovered_by: Option<String>) -> RecoveryOutcome {
        RecoveryOutcome {
            node: self.node,
            final_state: self.state,
            attempts: self.attempts,
            recovered_by,
        }
    }
}

/// Event kind and severity recorded for a state machine edge, or `None` for
/// an edge the episode never takes
fn transition_event(from: RecoveryState, to: RecoveryState) -> Option<(EventKind, Severity)> {
    use RecoveryState::*;
    match (from, to) {
        (Detected, Recovering) => Some((EventKind::RecoveryStarted, Severity::Warning)),
        (Recovering, Verifying) => Some((EventKind::RecoveryVerifying, Severity::Info)),
        (Verifying, Recovering) => Some((EventKind::RecoveryRetry, Severity::Info)),
        (Verifying, Recovered) => Some((EventKind::RecoverySuccessful, Severity::Info)),
        (Recovering, ExhaustedAttempts) => Some((EventKind::RecoveryFailed, Severity::Critical)),
        _ => None,
    }
}

fn combined_output(result: &ExecResult) -> String {
    let stdout = result.stdout.trim();
    let stderr = result.stderr.trim();
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{}\n{}", stdout, stderr),
    }
}
