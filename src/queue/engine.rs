//! Pending-job diagnostics: find jobs whose DOWN/DRAIN reason is stale.

use log::{debug, info, warn};
use serde::Serialize;
use std::time::Duration;

use crate::models::PendingJob;
use crate::queue::diagnoser::diagnose;
use crate::remote::RemoteExec;
use crate::slurm::commands::{PENDING_JOBS_COMMAND, node_resources_command};
use crate::slurm::{expand, parse_node_resources, parse_pending_jobs};

/// Reason keywords that trigger a diagnosis (case-sensitive)
const FAILURE_KEYWORDS: [&str; 2] = ["DOWN", "DRAIN"];

/// A pending job whose reported reason does not match the node resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueFinding {
    pub job: PendingJob,
    pub nodes: Vec<String>,
    pub real_reason: String,
    pub details: Vec<String>,
}

/// Runs queue diagnostics for one cluster through its head node
pub struct QueueDiagnosticEngine<'a> {
    cluster: &'a str,
    exec: &'a dyn RemoteExec,
    timeout: Duration,
}

impl<'a> QueueDiagnosticEngine<'a> {
    pub fn new(cluster: &'a str, exec: &'a dyn RemoteExec, timeout: Duration) -> Self {
        Self {
            cluster,
            exec,
            timeout,
        }
    }

    /// Fetch all pending jobs. A failed query yields no jobs.
    pub fn fetch_pending_jobs(&self) -> Vec<PendingJob> {
        let result = self.exec.execute(PENDING_JOBS_COMMAND, self.timeout);
        if !result.ok {
            warn!(
                "Failed to list pending jobs cluster={} exit_code={} stderr={}",
                self.cluster,
                result.exit_code,
                result.stderr.trim()
            );
            return Vec::new();
        }
        parse_pending_jobs(&result.stdout)
    }

    /// Diagnose a single job; None when the job's reason is accurate or cannot be checked
    pub fn diagnose_job(&self, job: &PendingJob) -> Option<QueueFinding> {
        if !FAILURE_KEYWORDS.iter().any(|k| job.reason.contains(k)) {
            return None;
        }

        let nodes = expand(&job.nodelist);
        if nodes.is_empty() {
            debug!(
                "No nodes to check cluster={} job_id={} nodelist={}",
                self.cluster, job.job_id, job.nodelist
            );
            return None;
        }

        let result = self
            .exec
            .execute(&node_resources_command(&nodes), self.timeout);
        if !result.ok {
            warn!(
                "Failed to fetch node resources cluster={} job_id={} exit_code={}",
                self.cluster, job.job_id, result.exit_code
            );
            return None;
        }

        let samples = parse_node_resources(&result.stdout);
        if samples.is_empty() {
            debug!(
                "No resource samples parsed cluster={} job_id={}",
                self.cluster, job.job_id
            );
            return None;
        }

        let diagnosis = diagnose(&samples);
        if !diagnosis.misleading {
            return None;
        }

        Some(QueueFinding {
            job: job.clone(),
            nodes,
            real_reason: diagnosis.reason,
            details: diagnosis.details,
        })
    }

    /// Fetch the pending queue and return only the misleading jobs, in queue order
    pub fn diagnose_queue(&self) -> Vec<QueueFinding> {
        let jobs = self.fetch_pending_jobs();
        let findings: Vec<QueueFinding> =
            jobs.iter().filter_map(|job| self.diagnose_job(job)).collect();
        info!(
            "Queue diagnosed cluster={} pending_jobs={} misleading={}",
            self.cluster,
            jobs.len(),
            findings.len()
        );
        findings
    }
}
