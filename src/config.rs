//! Layered TOML configuration.
//!
//! Files are read in order (system, user, local) and merged table by table, so a
//! later file only needs the keys it overrides. Missing files are skipped.

mod cluster;
mod monitor;

pub use cluster::{ClusterConfig, DEFAULT_PROBLEM_STATES};
pub use monitor::{MonitorConfig, NotificationConfig};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::ClusterDescriptor;

pub const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Locations searched for configuration files, lowest priority first
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub system: PathBuf,
    pub user: Option<PathBuf>,
    pub local: PathBuf,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigPaths {
    pub fn new() -> Self {
        Self {
            system: PathBuf::from("/etc/nodewatch/config.toml"),
            user: dirs::config_dir().map(|d| d.join("nodewatch").join("config.toml")),
            local: PathBuf::from("nodewatch.toml"),
        }
    }

    /// All candidate paths in load order
    pub fn all(&self) -> Vec<&PathBuf> {
        let mut paths = vec![&self.system];
        if let Some(user) = &self.user {
            paths.push(user);
        }
        paths.push(&self.local);
        paths
    }

    /// Candidate paths that exist, in load order
    pub fn existing_paths(&self) -> Vec<&PathBuf> {
        self.all().into_iter().filter(|p| p.exists()).collect()
    }

    pub fn user_config_dir(&self) -> Option<&Path> {
        self.user.as_ref().and_then(|p| p.parent())
    }
}

/// Complete nodewatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodewatchConfig {
    pub monitor: MonitorConfig,
    pub notification: NotificationConfig,
    /// Managed clusters by name
    pub clusters: BTreeMap<String, ClusterConfig>,
}

impl NodewatchConfig {
    /// Load from the standard locations
    pub fn load() -> Result<Self> {
        Self::load_with_paths(&ConfigPaths::new())
    }

    pub fn load_with_paths(paths: &ConfigPaths) -> Result<Self> {
        let files: Vec<PathBuf> = paths.existing_paths().into_iter().cloned().collect();
        Self::load_from_files(&files)
    }

    /// Merge the given files in order; nonexistent files are skipped
    pub fn load_from_files(files: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Table::new();
        for path in files {
            if !path.exists() {
                continue;
            }
            debug!("Loading configuration from {}", path.display());
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let table: toml::Table = content
                .parse()
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            merge_tables(&mut merged, table);
        }

        toml::Value::Table(merged)
            .try_into()
            .context("Invalid configuration")
    }

    /// Every problem in the configuration, or Ok if there are none
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !LOG_LEVELS.contains(&self.monitor.log_level.to_lowercase().as_str()) {
            errors.push(format!(
                "monitor.log_level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.monitor.log_level
            ));
        }
        if self.monitor.command_timeout_secs == 0 {
            errors.push("monitor.command_timeout_secs must be greater than 0".to_string());
        }
        if self.monitor.ssh_binary.trim().is_empty() {
            errors.push("monitor.ssh_binary must not be empty".to_string());
        }

        if self.notification.enabled {
            if self.notification.from.trim().is_empty() {
                errors.push(
                    "notification.from must be set when notifications are enabled".to_string(),
                );
            }
            if self.notification.to.is_empty() {
                errors.push("notification.to must list at least one recipient".to_string());
            }
        }

        for (name, cluster) in &self.clusters {
            errors.extend(cluster.validate(name));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Descriptors for all clusters, or only `name` when given
    pub fn cluster_descriptors(&self, name: Option<&str>) -> Result<Vec<ClusterDescriptor>> {
        match name {
            Some(name) => {
                let cluster = self
                    .clusters
                    .get(name)
                    .with_context(|| format!("Cluster '{}' not found in configuration", name))?;
                Ok(vec![cluster.descriptor(name)])
            }
            None => Ok(self
                .clusters
                .iter()
                .map(|(name, cluster)| cluster.descriptor(name))
                .collect()),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Commented starter configuration
    pub fn generate_default_config() -> String {
        r#"# nodewatch configuration
#
# Files are merged in order: /etc/nodewatch/config.toml,
# ~/.config/nodewatch/config.toml, ./nodewatch.toml

[monitor]
# database = "/var/lib/nodewatch/nodewatch.db"
log_level = "info"
# log_file = "/var/log/nodewatch.log"
recovery_wait_secs = 10
command_timeout_secs = 30
ssh_binary = "ssh"
ssh_connect_timeout_secs = 10
# control_host = "badenpowell"

[notification]
enabled = false
from = "nodewatch@localhost"
to = ["admin@example.com"]
sendmail_binary = "/usr/sbin/sendmail"
critical_threshold = 3

[clusters.spydur]
user = "installer"
head_node = "spydur"
nodes = ["spdr[01-18]", "spdr[50-61]"]
check_command = 'sinfo -h -N -o "%N %T"'
recovery_commands = [
    "sudo -u slurm scontrol update nodename={node} state=resume",
    'ssh {node} "sudo systemctl restart slurmd"',
]
problem_states = ["down", "drain", "drng", "fail", "failing", "maint", "unk", "unknown"]

[clusters.arachne]
user = "zeus"
head_node = "arachne"
nodes = ["node[01-03]", "node[51-53]"]
recovery_commands = [
    "sudo scontrol update nodename={node} state=resume",
    'ssh {node} "systemctl restart slurmd"',
]
"#
        .to_string()
    }
}

/// Recursively merge `overlay` into `base`; non-table values replace
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_tables_is_deep() {
        let mut base: toml::Table = "[a]\nx = 1\ny = 2\n[b]\nz = 3\n".parse().unwrap();
        let overlay: toml::Table = "[a]\ny = 20\n".parse().unwrap();
        merge_tables(&mut base, overlay);
        assert_eq!(base["a"]["x"].as_integer(), Some(1));
        assert_eq!(base["a"]["y"].as_integer(), Some(20));
        assert_eq!(base["b"]["z"].as_integer(), Some(3));
    }

    #[test]
    fn test_generated_config_is_valid() {
        let config: NodewatchConfig = toml::from_str(&NodewatchConfig::generate_default_config())
            .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.clusters.len(), 2);
        let spydur = config.cluster_descriptors(Some("spydur")).unwrap();
        assert_eq!(spydur[0].nodes.len(), 30);
    }
}
