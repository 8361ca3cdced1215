//! Per-cluster settings

use serde::{Deserialize, Serialize};

use crate::models::{ClusterDescriptor, NODE_PLACEHOLDER};
use crate::slurm::commands::NODE_STATUS_COMMAND;
use crate::slurm::nodelist;

pub const DEFAULT_PROBLEM_STATES: [&str; 8] = [
    "down", "drain", "drng", "fail", "failing", "maint", "unk", "unknown",
];

/// One `[clusters.<name>]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Management user for ssh to the head node
    pub user: String,

    /// Head node address (defaults to the cluster name)
    pub head_node: Option<String>,

    /// Nodes to monitor, in node-range notation (e.g. "spdr[01-18]").
    /// Empty means every node the status query reports.
    pub nodes: Vec<String>,

    /// Status query printing `<node> <state>` lines
    pub check_command: String,

    /// Recovery command templates, tried in order; `{node}` is replaced
    pub recovery_commands: Vec<String>,

    /// State substrings that mark a node unavailable
    pub problem_states: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            head_node: None,
            nodes: Vec::new(),
            check_command: NODE_STATUS_COMMAND.to_string(),
            recovery_commands: vec![
                "sudo scontrol update nodename={node} state=resume".to_string(),
            ],
            problem_states: DEFAULT_PROBLEM_STATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ClusterConfig {
    /// Build the immutable descriptor used by the engines
    pub fn descriptor(&self, name: &str) -> ClusterDescriptor {
        ClusterDescriptor {
            name: name.to_string(),
            user: self.user.clone(),
            head_node: self.head_node.clone().unwrap_or_else(|| name.to_string()),
            nodes: self.nodes.iter().flat_map(|n| nodelist::expand(n)).collect(),
            check_command: self.check_command.clone(),
            recovery_commands: self.recovery_commands.clone(),
            problem_states: self.problem_states.clone(),
        }
    }

    /// Problems with this cluster's settings, prefixed with `clusters.<name>`
    pub fn validate(&self, name: &str) -> Vec<String> {
        let mut errors = Vec::new();
        let prefix = format!("clusters.{}", name);

        if self.user.trim().is_empty() {
            errors.push(format!("{}.user must be set", prefix));
        }
        if self.head_node.as_deref().is_some_and(|h| h.trim().is_empty()) {
            errors.push(format!("{}.head_node must not be empty", prefix));
        }
        if self.check_command.trim().is_empty() {
            errors.push(format!("{}.check_command must not be empty", prefix));
        }
        for (i, template) in self.recovery_commands.iter().enumerate() {
            if !template.contains(NODE_PLACEHOLDER) {
                errors.push(format!(
                    "{}.recovery_commands[{}] must contain {}",
                    prefix, i, NODE_PLACEHOLDER
                ));
            }
        }
        if self.problem_states.iter().any(|s| s.trim().is_empty()) {
            errors.push(format!("{}.problem_states must not contain empty entries", prefix));
        }
        for entry in &self.nodes {
            if nodelist::expand(entry).is_empty() {
                errors.push(format!("{}.nodes entry '{}' names no nodes", prefix, entry));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_config_defaults() {
        let config = ClusterConfig::default();
        assert!(config.user.is_empty());
        assert!(config.head_node.is_none());
        assert_eq!(config.check_command, r#"sinfo -h -N -o "%N %T""#);
        assert_eq!(config.recovery_commands.len(), 1);
        assert_eq!(config.problem_states.len(), 8);
    }

    #[test]
    fn test_descriptor_expands_node_ranges() {
        let config = ClusterConfig {
            user: "installer".to_string(),
            nodes: vec!["spdr[01-03]".to_string(), "spdr50".to_string()],
            ..Default::default()
        };
        let descriptor = config.descriptor("spydur");
        assert_eq!(descriptor.head_node, "spydur");
        assert_eq!(descriptor.nodes, vec!["spdr01", "spdr02", "spdr03", "spdr50"]);
    }

    #[test]
    fn test_validate_cluster() {
        let config = ClusterConfig {
            user: String::new(),
            recovery_commands: vec!["sudo scontrol update state=resume".to_string()],
            nodes: vec!["(null)".to_string()],
            ..Default::default()
        };
        let errors = config.validate("arachne");
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("clusters.arachne.user")));
        assert!(errors.iter().any(|e| e.contains("recovery_commands[0]")));
        assert!(errors.iter().any(|e| e.contains("nodes entry")));
    }
}
