//! Scheduler command strings sent through the head node.

use crate::slurm::nodelist;

/// Default node status query, printing `<node> <state>` per line
pub const NODE_STATUS_COMMAND: &str = r#"sinfo -h -N -o "%N %T""#;

/// Pending jobs as `id|partition|name|user|reason|nodelist`
pub const PENDING_JOBS_COMMAND: &str = "squeue -t PD -o '%i|%P|%j|%u|%r|%R' --noheader";

/// Build the `scontrol show node` query for a set of nodes
pub fn node_resources_command(nodes: &[String]) -> String {
    format!("scontrol show node {}", nodelist::compact(nodes))
}
