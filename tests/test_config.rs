//! Tests for the configuration management module

use nodewatch::config::{
    ClusterConfig, ConfigPaths, DEFAULT_PROBLEM_STATES, MonitorConfig, NodewatchConfig,
    NotificationConfig,
};
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn nonexistent_paths() -> ConfigPaths {
    ConfigPaths {
        system: PathBuf::from("/nonexistent/system/config.toml"),
        user: Some(PathBuf::from("/nonexistent/user/config.toml")),
        local: PathBuf::from("/nonexistent/local/nodewatch.toml"),
    }
}

fn valid_cluster() -> ClusterConfig {
    ClusterConfig {
        user: "installer".to_string(),
        ..Default::default()
    }
}

// ============== Default Value Tests ==============

#[rstest]
fn test_monitor_config_defaults() {
    let config = MonitorConfig::default();
    assert!(config.database.is_none());
    assert_eq!(config.log_level, "info");
    assert!(config.log_file.is_none());
    assert_eq!(config.recovery_wait_secs, 10);
    assert_eq!(config.command_timeout_secs, 30);
    assert_eq!(config.ssh_binary, "ssh");
    assert_eq!(config.ssh_connect_timeout_secs, 10);
}

#[rstest]
fn test_notification_config_defaults() {
    let config = NotificationConfig::default();
    assert!(!config.enabled);
    assert!(config.to.is_empty());
    assert_eq!(config.sendmail_binary, "/usr/sbin/sendmail");
    assert_eq!(config.critical_threshold, 3);
}

#[rstest]
fn test_cluster_config_defaults() {
    let config = ClusterConfig::default();
    assert_eq!(config.problem_states, DEFAULT_PROBLEM_STATES.to_vec());
    assert!(config.nodes.is_empty());
}

#[rstest]
fn test_explicit_database_path_wins() {
    let config = MonitorConfig {
        database: Some(PathBuf::from("/var/lib/nodewatch/monitor.db")),
        ..Default::default()
    };
    assert_eq!(
        config.database_path(),
        PathBuf::from("/var/lib/nodewatch/monitor.db")
    );
    assert!(
        MonitorConfig::default()
            .database_path()
            .ends_with("nodewatch.db")
    );
}

#[rstest]
fn test_control_host_override() {
    let config = MonitorConfig {
        control_host: Some("badenpowell".to_string()),
        ..Default::default()
    };
    assert_eq!(config.control_host(), "badenpowell");
    assert!(!MonitorConfig::default().control_host().is_empty());
}

// ============== Config Paths Tests ==============

#[rstest]
fn test_config_paths_new() {
    let paths = ConfigPaths::new();
    assert_eq!(paths.system, PathBuf::from("/etc/nodewatch/config.toml"));
    assert_eq!(paths.local, PathBuf::from("nodewatch.toml"));
    assert_eq!(paths.all().len(), if paths.user.is_some() { 3 } else { 2 });
}

#[rstest]
fn test_config_paths_existing_paths_empty() {
    assert!(nonexistent_paths().existing_paths().is_empty());
}

#[rstest]
fn test_config_paths_user_config_dir() {
    let paths = ConfigPaths::new();
    if let Some(user_path) = &paths.user {
        assert_eq!(paths.user_config_dir(), user_path.parent());
    }
}

#[rstest]
fn test_existing_paths_with_actual_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[monitor]\nlog_level = \"debug\"\n").unwrap();

    let paths = ConfigPaths {
        system: PathBuf::from("/nonexistent"),
        user: Some(config_path.clone()),
        local: PathBuf::from("/nonexistent"),
    };

    let existing = paths.existing_paths();
    assert_eq!(existing.len(), 1);
    assert_eq!(existing[0], &config_path);
}

// ============== Config Loading Tests ==============

#[rstest]
fn test_load_returns_defaults_when_no_files() {
    let config = NodewatchConfig::load_with_paths(&nonexistent_paths()).unwrap();
    assert_eq!(config.monitor.log_level, "info");
    assert!(config.clusters.is_empty());
}

#[rstest]
fn test_load_from_toml_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
[monitor]
database = "/srv/nodewatch/nodewatch.db"
log_level = "debug"
recovery_wait_secs = 5

[notification]
enabled = true
from = "nodewatch@example.edu"
to = ["hpc@example.edu"]

[clusters.spydur]
user = "installer"
nodes = ["spdr[01-18]", "spdr[50-61]"]
recovery_commands = ["sudo -u slurm scontrol update nodename={node} state=resume"]
"#;

    fs::write(&config_path, toml_content).unwrap();

    let config = NodewatchConfig::load_from_files(&[config_path]).unwrap();
    assert_eq!(
        config.monitor.database,
        Some(PathBuf::from("/srv/nodewatch/nodewatch.db"))
    );
    assert_eq!(config.monitor.log_level, "debug");
    assert_eq!(config.monitor.recovery_wait_secs, 5);
    assert_eq!(config.monitor.command_timeout_secs, 30);
    assert!(config.notification.enabled);
    assert!(config.validate().is_ok());

    let descriptors = config.cluster_descriptors(None).unwrap();
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].head_node, "spydur");
    assert_eq!(descriptors[0].nodes.len(), 30);
    assert_eq!(descriptors[0].nodes[18], "spdr50");
}

#[rstest]
fn test_load_with_priority_order() {
    let temp_dir = TempDir::new().unwrap();
    let system = temp_dir.path().join("system.toml");
    let local = temp_dir.path().join("local.toml");

    fs::write(
        &system,
        r#"
[monitor]
log_level = "warn"
command_timeout_secs = 60

[clusters.arachne]
user = "zeus"
head_node = "arachne.example.edu"
"#,
    )
    .unwrap();
    fs::write(
        &local,
        r#"
[monitor]
log_level = "debug"

[clusters.arachne]
nodes = ["node[51-53]"]
"#,
    )
    .unwrap();

    let paths = ConfigPaths {
        system,
        user: None,
        local,
    };
    let config = NodewatchConfig::load_with_paths(&paths).unwrap();

    // later file wins, untouched keys survive
    assert_eq!(config.monitor.log_level, "debug");
    assert_eq!(config.monitor.command_timeout_secs, 60);
    let arachne = &config.clusters["arachne"];
    assert_eq!(arachne.user, "zeus");
    assert_eq!(arachne.head_node.as_deref(), Some("arachne.example.edu"));
    assert_eq!(arachne.nodes, vec!["node[51-53]"]);
}

#[rstest]
fn test_load_rejects_malformed_toml() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[monitor\nlog_level = ").unwrap();
    assert!(NodewatchConfig::load_from_files(&[config_path]).is_err());
}

#[rstest]
fn test_unknown_cluster_is_an_error() {
    let mut config = NodewatchConfig::default();
    config.clusters.insert("spydur".to_string(), valid_cluster());
    assert!(config.cluster_descriptors(Some("spydur")).is_ok());
    assert!(config.cluster_descriptors(Some("hopper")).is_err());
}

// ============== Validation Tests ==============

#[rstest]
fn test_validate_valid_config() {
    let mut config = NodewatchConfig::default();
    config.clusters.insert("spydur".to_string(), valid_cluster());
    assert!(config.validate().is_ok());
}

#[rstest]
#[case("loud")]
#[case("")]
fn test_validate_invalid_log_level(#[case] level: &str) {
    let mut config = NodewatchConfig::default();
    config.monitor.log_level = level.to_string();
    let errors = config.validate().unwrap_err();
    assert!(errors.iter().any(|e| e.contains("log_level")));
}

#[rstest]
fn test_validate_zero_timeout() {
    let mut config = NodewatchConfig::default();
    config.monitor.command_timeout_secs = 0;
    let errors = config.validate().unwrap_err();
    assert!(errors.iter().any(|e| e.contains("command_timeout_secs")));
}

#[rstest]
fn test_validate_enabled_notifications_need_addresses() {
    let mut config = NodewatchConfig::default();
    config.notification.enabled = true;
    let errors = config.validate().unwrap_err();
    assert!(errors.iter().any(|e| e.contains("notification.from")));
    assert!(errors.iter().any(|e| e.contains("notification.to")));
}

#[rstest]
fn test_validate_multiple_errors() {
    let mut config = NodewatchConfig::default();
    config.monitor.log_level = "invalid".to_string();
    config.monitor.ssh_binary = " ".to_string();
    config.clusters.insert(
        "arachne".to_string(),
        ClusterConfig {
            recovery_commands: vec!["reboot".to_string()],
            ..Default::default()
        },
    );

    let errors = config.validate().unwrap_err();
    assert!(errors.len() >= 4);
    assert!(errors.iter().any(|e| e.starts_with("clusters.arachne.")));
}

// ============== Serialization Tests ==============

#[rstest]
fn test_generate_default_config() {
    let content = NodewatchConfig::generate_default_config();
    assert!(content.contains("[monitor]"));
    assert!(content.contains("[notification]"));
    assert!(content.contains("[clusters.spydur]"));
    assert!(content.contains("{node}"));
}

#[rstest]
fn test_roundtrip_serialization() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let mut original = NodewatchConfig::default();
    original.monitor.log_level = "debug".to_string();
    original.monitor.recovery_wait_secs = 20;
    original.notification.to = vec!["hpc@example.edu".to_string()];
    original.clusters.insert(
        "spydur".to_string(),
        ClusterConfig {
            user: "installer".to_string(),
            nodes: vec!["spdr[01-18]".to_string()],
            ..Default::default()
        },
    );

    fs::write(&config_path, original.to_toml().unwrap()).unwrap();
    let loaded = NodewatchConfig::load_from_files(&[config_path]).unwrap();

    assert_eq!(loaded.monitor.log_level, "debug");
    assert_eq!(loaded.monitor.recovery_wait_secs, 20);
    assert_eq!(loaded.notification.to, original.notification.to);
    assert_eq!(loaded.clusters["spydur"].nodes, vec!["spdr[01-18]"]);
    assert_eq!(
        loaded.clusters["spydur"].recovery_commands,
        original.clusters["spydur"].recovery_commands
    );
}

// ============== JSON Serialization Tests ==============

#[rstest]
fn test_json_serialization() {
    let config = NodewatchConfig::default();
    let json_str = serde_json::to_string_pretty(&config).unwrap();

    assert!(json_str.contains("\"monitor\""));
    assert!(json_str.contains("\"notification\""));
    assert!(json_str.contains("\"clusters\""));
}

#[rstest]
fn test_json_deserialization() {
    let json_str = r#"{
        "monitor": { "log_level": "trace", "ssh_binary": "/usr/bin/ssh" },
        "clusters": {
            "arachne": { "user": "zeus", "nodes": ["node[01-03]"] }
        }
    }"#;

    let config: NodewatchConfig = serde_json::from_str(json_str).unwrap();
    assert_eq!(config.monitor.log_level, "trace");
    assert_eq!(config.monitor.ssh_binary, "/usr/bin/ssh");
    assert_eq!(config.monitor.command_timeout_secs, 30);
    assert_eq!(config.clusters["arachne"].user, "zeus");
    assert!(config.validate().is_ok());
}
