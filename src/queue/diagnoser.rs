//! Attribution of a pending job's real blocking cause from node resource samples.

use serde::Serialize;

use crate::models::NodeResourceSample;

/// States for which a DOWN/DRAIN reason is accurate
pub const DOWN_STATES: [&str; 4] = ["down", "drained", "draining", "fail"];

/// Free memory at or below this is treated as fully allocated
pub const MEMORY_SLACK_MB: i64 = 1000;

pub const REASON_CPUS_FULL: &str = "CPUs fully allocated";
pub const REASON_GPUS_FULL: &str = "GPUs fully allocated";
pub const REASON_MEMORY_FULL: &str = "Memory fully allocated";
pub const REASON_BUSY: &str = "Resources busy (partition/priority)";
const BUSY_DETAIL: &str = "Nodes available but allocated to higher priority jobs";

/// Verdict on whether a scheduler-reported reason is stale
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Diagnosis {
    pub misleading: bool,
    pub reason: String,
    pub details: Vec<String>,
}

impl Diagnosis {
    fn accurate() -> Self {
        Self::default()
    }

    fn misleading(reason: &str, details: Vec<String>) -> Self {
        Self {
            misleading: true,
            reason: reason.to_string(),
            details,
        }
    }
}

/// Diagnose the sampled nodes jointly.
///
/// When every node really is down the reported reason stands. Otherwise the
/// real cause is attributed in a fixed order: CPU, GPU, memory, then the
/// priority catch-all. Only nodes reporting a nonzero total for a resource take
/// part in that resource's check. Details follow the order of `samples`.
pub fn diagnose(samples: &[NodeResourceSample]) -> Diagnosis {
    let mut all_down = true;
    let mut all_cpus_full = true;
    let mut all_mem_full = true;

    let mut cpu_details = Vec::new();
    let mut gpu_details = Vec::new();
    let mut mem_details = Vec::new();

    for sample in samples {
        let node = &sample.node_name;
        if !DOWN_STATES.contains(&sample.state.as_str()) {
            all_down = false;
        }

        if sample.cpus_total > 0 {
            let free = sample.cpus_free();
            if free > 0 {
                all_cpus_full = false;
            }
            cpu_details.push(format!("{}: {}/{} CPUs free", node, free, sample.cpus_total));
        }

        // Placeholder: any GPU-bearing node counts as full. Telling allocated
        // GPUs apart needs AllocTRES, which is not sampled.
        if sample.gpus_total > 0 {
            gpu_details.push(format!("{}: {} GPUs", node, sample.gpus_total));
        }

        if sample.mem_total_mb > 0 {
            let free = sample.mem_free_mb();
            if free > MEMORY_SLACK_MB {
                all_mem_full = false;
            }
            mem_details.push(format!(
                "{}: {}MB/{}MB free",
                node, free, sample.mem_total_mb
            ));
        }
    }

    if all_down {
        return Diagnosis::accurate();
    }

    if all_cpus_full {
        Diagnosis::misleading(REASON_CPUS_FULL, cpu_details)
    } else if !gpu_details.is_empty() {
        Diagnosis::misleading(REASON_GPUS_FULL, gpu_details)
    } else if all_mem_full {
        Diagnosis::misleading(REASON_MEMORY_FULL, mem_details)
    } else {
        Diagnosis::misleading(REASON_BUSY, vec![BUSY_DETAIL.to_string()])
    }
}
