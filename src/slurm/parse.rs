//! Parsers for the plain-text output of `sinfo`, `squeue` and `scontrol`.
//!
//! Malformed input never produces an error: bad lines are skipped with a warning
//! so that one odd node or job cannot halt a whole cycle.

use log::{trace, warn};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::models::{NodeResourceSample, PendingJob};

static GPU_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"gpu:(?:[A-Za-z0-9_.\-]+:)?(\d+)").expect("valid gres regex"));

/// Number of `|` separated fields requested from squeue
pub const PENDING_JOB_FIELDS: usize = 6;

/// A `<node> <state>` pair from the status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStateLine {
    pub node_name: String,
    pub state: String,
}

/// Parse `sinfo -h -N -o "%N %T"` output.
///
/// Nodes that appear in several partitions are reported once, at their first
/// position.
pub fn parse_node_states(output: &str) -> Vec<NodeStateLine> {
    trace!("sinfo output: [{}]", output);
    let mut seen = HashSet::new();
    let mut states = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 2 {
            warn!("Skipping malformed sinfo line: {}", line);
            continue;
        }

        if seen.insert(fields[0].to_string()) {
            states.push(NodeStateLine {
                node_name: fields[0].to_string(),
                state: fields[1].to_string(),
            });
        }
    }

    states
}

/// Parse `squeue -o '%i|%P|%j|%u|%r|%R' --noheader` output
pub fn parse_pending_jobs(output: &str) -> Vec<PendingJob> {
    trace!("squeue output: [{}]", output);
    let mut jobs = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        if fields.len() != PENDING_JOB_FIELDS {
            warn!(
                "Skipping malformed squeue line: got {} fields, expected {}: {}",
                fields.len(),
                PENDING_JOB_FIELDS,
                line
            );
            continue;
        }

        jobs.push(PendingJob {
            job_id: fields[0].to_string(),
            partition: fields[1].to_string(),
            name: fields[2].to_string(),
            user: fields[3].to_string(),
            reason: fields[4].to_string(),
            nodelist: fields[5].to_string(),
        });
    }

    jobs
}

/// Parse `scontrol show node` output into per-node resource samples.
///
/// Each `NodeName=` token starts a new record; the fields that follow belong to
/// it until the next `NodeName=`. Fields seen before any `NodeName=` are
/// ignored and unparseable numbers leave the default of zero.
///
/// Samples keep the order scontrol printed them in. A repeated node name
/// replaces the earlier record at its original position.
pub fn parse_node_resources(output: &str) -> Vec<NodeResourceSample> {
    trace!("scontrol output: [{}]", output);
    let mut samples = Vec::new();
    let mut current: Option<NodeResourceSample> = None;

    for token in output.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };

        if key == "NodeName" {
            if let Some(sample) = current.take() {
                push_sample(&mut samples, sample);
            }
            if !value.is_empty() {
                current = Some(NodeResourceSample::new(value));
            }
            continue;
        }

        let Some(sample) = current.as_mut() else {
            continue;
        };

        match key {
            "State" => sample.state = value.to_lowercase(),
            "CPUAlloc" => sample.cpus_alloc = value.parse().unwrap_or(0),
            "CPUTot" => sample.cpus_total = value.parse().unwrap_or(0),
            "AllocMem" => sample.mem_alloc_mb = value.parse().unwrap_or(0),
            "RealMemory" => sample.mem_total_mb = value.parse().unwrap_or(0),
            "Gres" => sample.gpus_total = parse_gpu_count(value),
            _ => {}
        }
    }

    if let Some(sample) = current {
        push_sample(&mut samples, sample);
    }

    samples
}

fn push_sample(samples: &mut Vec<NodeResourceSample>, sample: NodeResourceSample) {
    match samples.iter_mut().find(|s| s.node_name == sample.node_name) {
        Some(existing) => *existing = sample,
        None => samples.push(sample),
    }
}

/// Extract the GPU count from a `Gres=` value such as `gpu:4` or `gpu:a100:4(S:0)`
fn parse_gpu_count(gres: &str) -> u32 {
    GPU_COUNT
        .captures(gres)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}
