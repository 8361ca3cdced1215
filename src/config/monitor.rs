//! Monitoring and notification settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings shared by every monitoring and diagnostic run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Path to the SQLite database file (defaults to the user data directory)
    pub database: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,

    /// Also write log output to this file
    pub log_file: Option<PathBuf>,

    /// Seconds to wait after a recovery command before re-checking the node
    pub recovery_wait_secs: u64,

    /// Timeout in seconds for each remote command
    pub command_timeout_secs: u64,

    /// ssh client binary
    pub ssh_binary: String,

    /// Passed to ssh as `-o ConnectTimeout=`
    pub ssh_connect_timeout_secs: u64,

    /// Name recorded as `checked_from` (defaults to this host's name)
    pub control_host: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            database: None,
            log_level: "info".to_string(),
            log_file: None,
            recovery_wait_secs: 10,
            command_timeout_secs: 30,
            ssh_binary: "ssh".to_string(),
            ssh_connect_timeout_secs: 10,
            control_host: None,
        }
    }
}

impl MonitorConfig {
    /// Configured database path, else `<data dir>/nodewatch/nodewatch.db`
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database {
            return path.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("nodewatch").join("nodewatch.db"))
            .unwrap_or_else(|| PathBuf::from("nodewatch.db"))
    }

    /// Configured control host, else the local hostname
    pub fn control_host(&self) -> String {
        if let Some(host) = &self.control_host {
            return host.clone();
        }
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string())
    }
}

/// Email notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Send mail; when false notifications are only logged
    pub enabled: bool,

    /// Sender address
    pub from: String,

    /// Recipient addresses
    pub to: Vec<String>,

    /// sendmail-compatible binary that accepts `-t`
    pub sendmail_binary: String,

    /// Problem-node count above which notifications are critical
    pub critical_threshold: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            from: String::new(),
            to: Vec::new(),
            sendmail_binary: "/usr/sbin/sendmail".to_string(),
            critical_threshold: 3,
        }
    }
}
