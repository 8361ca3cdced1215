//! Read-only report queries over the monitoring database.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeDelta, Utc};
use log::info;
use serde::Serialize;
use sqlx::Row;
use tabled::Tabled;

use crate::models::{Event, RecoveryAttempt};
use crate::store::sqlite::{attempt_from_row, event_from_row, format_timestamp};
use crate::store::SqliteStore;

/// Start of a lookback window of `days` days ending now.
///
/// Windows reaching past the representable range start at the Unix epoch.
pub fn cutoff(days: u32) -> DateTime<Utc> {
    TimeDelta::try_days(i64::from(days))
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .max(DateTime::<Utc>::UNIX_EPOCH)
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct NodeListRow {
    #[tabled(rename = "Cluster")]
    pub cluster: String,
    #[tabled(rename = "Node")]
    pub node_name: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct RecoveryStatRow {
    #[tabled(rename = "Cluster")]
    pub cluster: String,
    #[tabled(rename = "Node")]
    pub node_name: String,
    #[tabled(rename = "Command")]
    pub command: String,
    #[tabled(rename = "Attempts")]
    pub attempts: i64,
    #[tabled(rename = "Successful")]
    pub successful: i64,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct DowntimeRow {
    #[tabled(rename = "Cluster")]
    pub cluster: String,
    #[tabled(rename = "Node")]
    pub node_name: String,
    #[tabled(rename = "Checks")]
    pub checks: i64,
    #[tabled(rename = "Down Checks")]
    pub down_checks: i64,
    #[tabled(rename = "Downtime %")]
    pub downtime_percent: f64,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct HealthRow {
    #[tabled(rename = "Cluster")]
    pub cluster: String,
    #[tabled(rename = "Total")]
    pub total_nodes: i64,
    #[tabled(rename = "Healthy")]
    pub healthy_nodes: i64,
    #[tabled(rename = "Problems")]
    pub problem_nodes: i64,
    #[tabled(rename = "Issues (24h)")]
    pub issues_24h: i64,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct EventCountRow {
    #[tabled(rename = "Cluster")]
    pub cluster: String,
    #[tabled(rename = "Node")]
    pub node_name: String,
    #[tabled(rename = "Event")]
    pub event_type: String,
    #[tabled(rename = "Count")]
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct RecoveryOutcomeRow {
    #[tabled(rename = "Cluster")]
    pub cluster: String,
    #[tabled(rename = "Result")]
    pub result: String,
    #[tabled(rename = "Attempts")]
    pub count: i64,
}

/// Events and recovery attempts for one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeDetail {
    pub cluster: String,
    pub node_name: String,
    pub events: Vec<Event>,
    pub attempts: Vec<RecoveryAttempt>,
}

/// Problem-event counts and recovery outcomes over a window
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub days: u32,
    pub generated: DateTime<Utc>,
    pub events: Vec<EventCountRow>,
    pub recoveries: Vec<RecoveryOutcomeRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub node_status_rows: i64,
    pub node_events_rows: i64,
    pub recovery_attempts_rows: i64,
    pub oldest_record: Option<String>,
    pub newest_record: Option<String>,
    pub file_size_bytes: Option<u64>,
}

/// Rows deleted by a cleanup, per table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub node_status: u64,
    pub node_events: u64,
    pub recovery_attempts: u64,
}

impl SqliteStore {
    /// Every (cluster, node) pair ever observed
    pub fn list_nodes(&self, cluster: Option<&str>) -> Result<Vec<NodeListRow>> {
        let rows = self
            .block_on(
                sqlx::query(
                    r#"
                    SELECT DISTINCT cluster, node_name
                    FROM node_status
                    WHERE $1 IS NULL OR cluster = $1
                    ORDER BY cluster, node_name
                    "#,
                )
                .bind(cluster)
                .fetch_all(self.pool()),
            )
            .context("Failed to list nodes")?;

        rows.iter()
            .map(|row| -> Result<NodeListRow> {
                Ok(NodeListRow {
                    cluster: row.try_get("cluster")?,
                    node_name: row.try_get("node_name")?,
                })
            })
            .collect()
    }

    /// Warning and worse events in the window, newest first
    pub fn problem_history(&self, days: u32, cluster: Option<&str>) -> Result<Vec<Event>> {
        let rows = self
            .block_on(
                sqlx::query(
                    r#"
                    SELECT timestamp, cluster, node_name, event_type, details, severity
                    FROM node_events
                    WHERE timestamp > $1
                      AND severity IN ('warning', 'error', 'critical')
                      AND ($2 IS NULL OR cluster = $2)
                    ORDER BY timestamp DESC, id DESC
                    "#,
                )
                .bind(format_timestamp(&cutoff(days)))
                .bind(cluster)
                .fetch_all(self.pool()),
            )
            .context("Failed to query problem history")?;

        rows.iter().map(event_from_row).collect()
    }

    /// Attempt and success counts per node and command
    pub fn recovery_stats(&self, days: u32, cluster: Option<&str>) -> Result<Vec<RecoveryStatRow>> {
        let rows = self
            .block_on(
                sqlx::query(
                    r#"
                    SELECT cluster, node_name, command,
                           COUNT(*) AS attempts,
                           SUM(CASE WHEN success = 1 THEN 1 ELSE 0 END) AS successful
                    FROM recovery_attempts
                    WHERE timestamp > $1 AND ($2 IS NULL OR cluster = $2)
                    GROUP BY cluster, node_name, command
                    ORDER BY cluster, node_name, command
                    "#,
                )
                .bind(format_timestamp(&cutoff(days)))
                .bind(cluster)
                .fetch_all(self.pool()),
            )
            .context("Failed to query recovery statistics")?;

        rows.iter()
            .map(|row| -> Result<RecoveryStatRow> {
                Ok(RecoveryStatRow {
                    cluster: row.try_get("cluster")?,
                    node_name: row.try_get("node_name")?,
                    command: row.try_get("command")?,
                    attempts: row.try_get("attempts")?,
                    successful: row.try_get("successful")?,
                })
            })
            .collect()
    }

    /// Nodes with at least one unavailable check in the window, worst first
    pub fn downtime_stats(&self, days: u32, cluster: Option<&str>) -> Result<Vec<DowntimeRow>> {
        let rows = self
            .block_on(
                sqlx::query(
                    r#"
                    SELECT cluster, node_name,
                           COUNT(*) AS checks,
                           SUM(CASE WHEN is_available = 0 THEN 1 ELSE 0 END) AS down_checks
                    FROM node_status
                    WHERE timestamp > $1 AND ($2 IS NULL OR cluster = $2)
                    GROUP BY cluster, node_name
                    HAVING down_checks > 0
                    ORDER BY cluster, down_checks DESC, node_name
                    "#,
                )
                .bind(format_timestamp(&cutoff(days)))
                .bind(cluster)
                .fetch_all(self.pool()),
            )
            .context("Failed to query downtime statistics")?;

        rows.iter()
            .map(|row| -> Result<DowntimeRow> {
                let checks: i64 = row.try_get("checks")?;
                let down_checks: i64 = row.try_get("down_checks")?;
                Ok(DowntimeRow {
                    cluster: row.try_get("cluster")?,
                    node_name: row.try_get("node_name")?,
                    checks,
                    down_checks,
                    downtime_percent: percent(down_checks, checks),
                })
            })
            .collect()
    }

    /// Per-cluster counts from the latest check plus problem events in the last 24 hours
    pub fn health_summary(&self) -> Result<Vec<HealthRow>> {
        let since = format_timestamp(&(Utc::now() - Duration::hours(24)));
        let rows = self
            .block_on(
                sqlx::query(
                    r#"
                    SELECT s.cluster,
                           COUNT(*) AS total_nodes,
                           SUM(CASE WHEN s.is_available = 1 THEN 1 ELSE 0 END) AS healthy_nodes,
                           (SELECT COUNT(*) FROM node_events e
                            WHERE e.cluster = s.cluster AND e.timestamp > $1
                              AND e.severity IN ('warning', 'error', 'critical')) AS issues_24h
                    FROM node_status s
                    INNER JOIN (
                        SELECT cluster, MAX(timestamp) AS max_ts
                        FROM node_status
                        GROUP BY cluster
                    ) latest ON s.cluster = latest.cluster AND s.timestamp = latest.max_ts
                    GROUP BY s.cluster
                    ORDER BY s.cluster
                    "#,
                )
                .bind(since)
                .fetch_all(self.pool()),
            )
            .context("Failed to query health summary")?;

        rows.iter()
            .map(|row| -> Result<HealthRow> {
                let total_nodes: i64 = row.try_get("total_nodes")?;
                let healthy_nodes: i64 = row.try_get("healthy_nodes")?;
                Ok(HealthRow {
                    cluster: row.try_get("cluster")?,
                    total_nodes,
                    healthy_nodes,
                    problem_nodes: total_nodes - healthy_nodes,
                    issues_24h: row.try_get("issues_24h")?,
                })
            })
            .collect()
    }

    /// Event and recovery history of one node, newest first
    pub fn node_detail(&self, cluster: &str, node_name: &str, days: u32) -> Result<NodeDetail> {
        let since = format_timestamp(&cutoff(days));
        let (event_rows, attempt_rows) = self
            .block_on(async {
                let events = sqlx::query(
                    r#"
                    SELECT timestamp, cluster, node_name, event_type, details, severity
                    FROM node_events
                    WHERE cluster = $1 AND node_name = $2 AND timestamp > $3
                    ORDER BY timestamp DESC, id DESC
                    "#,
                )
                .bind(cluster)
                .bind(node_name)
                .bind(&since)
                .fetch_all(self.pool())
                .await?;

                let attempts = sqlx::query(
                    r#"
                    SELECT timestamp, cluster, node_name, command, exit_code, output, success
                    FROM recovery_attempts
                    WHERE cluster = $1 AND node_name = $2 AND timestamp > $3
                    ORDER BY timestamp DESC, id DESC
                    "#,
                )
                .bind(cluster)
                .bind(node_name)
                .bind(&since)
                .fetch_all(self.pool())
                .await?;

                Ok::<_, sqlx::Error>((events, attempts))
            })
            .with_context(|| format!("Failed to query history of {}/{}", cluster, node_name))?;

        Ok(NodeDetail {
            cluster: cluster.to_string(),
            node_name: node_name.to_string(),
            events: event_rows
                .iter()
                .map(event_from_row)
                .collect::<Result<_>>()?,
            attempts: attempt_rows
                .iter()
                .map(attempt_from_row)
                .collect::<Result<_>>()?,
        })
    }

    /// Problem-event counts per node and recovery outcomes per cluster
    pub fn status_report(&self, days: u32) -> Result<StatusReport> {
        let since = format_timestamp(&cutoff(days));
        let (event_rows, recovery_rows) = self
            .block_on(async {
                let events = sqlx::query(
                    r#"
                    SELECT cluster, node_name, event_type, COUNT(*) AS count
                    FROM node_events
                    WHERE timestamp > $1 AND severity IN ('warning', 'error', 'critical')
                    GROUP BY cluster, node_name, event_type
                    ORDER BY count DESC, cluster, node_name, event_type
                    "#,
                )
                .bind(&since)
                .fetch_all(self.pool())
                .await?;

                let recoveries = sqlx::query(
                    r#"
                    SELECT cluster, success, COUNT(*) AS count
                    FROM recovery_attempts
                    WHERE timestamp > $1
                    GROUP BY cluster, success
                    ORDER BY cluster, success DESC
                    "#,
                )
                .bind(&since)
                .fetch_all(self.pool())
                .await?;

                Ok::<_, sqlx::Error>((events, recoveries))
            })
            .context("Failed to build status report")?;

        let events = event_rows
            .iter()
            .map(|row| -> Result<EventCountRow> {
                Ok(EventCountRow {
                    cluster: row.try_get("cluster")?,
                    node_name: row.try_get("node_name")?,
                    event_type: row.try_get("event_type")?,
                    count: row.try_get("count")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let recoveries = recovery_rows
            .iter()
            .map(|row| -> Result<RecoveryOutcomeRow> {
                let success: bool = row.try_get("success")?;
                Ok(RecoveryOutcomeRow {
                    cluster: row.try_get("cluster")?,
                    result: if success { "Success" } else { "Failed" }.to_string(),
                    count: row.try_get("count")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(StatusReport {
            days,
            generated: Utc::now(),
            events,
            recoveries,
        })
    }

    pub fn database_stats(&self) -> Result<DatabaseStats> {
        let row = self
            .block_on(
                sqlx::query(
                    r#"
                    SELECT (SELECT COUNT(*) FROM node_status) AS node_status_rows,
                           (SELECT COUNT(*) FROM node_events) AS node_events_rows,
                           (SELECT COUNT(*) FROM recovery_attempts) AS recovery_attempts_rows,
                           (SELECT MIN(timestamp) FROM node_status) AS oldest_record,
                           (SELECT MAX(timestamp) FROM node_status) AS newest_record
                    "#,
                )
                .fetch_one(self.pool()),
            )
            .context("Failed to query database statistics")?;

        let file_size_bytes = self
            .path()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len());

        Ok(DatabaseStats {
            node_status_rows: row.try_get("node_status_rows")?,
            node_events_rows: row.try_get("node_events_rows")?,
            recovery_attempts_rows: row.try_get("recovery_attempts_rows")?,
            oldest_record: row.try_get("oldest_record")?,
            newest_record: row.try_get("newest_record")?,
            file_size_bytes,
        })
    }

    /// Delete rows older than `days` days from every table, then reclaim space
    pub fn cleanup_older_than(&self, days: u32) -> Result<CleanupSummary> {
        let before = format_timestamp(&cutoff(days));
        let summary = self
            .block_on(async {
                let mut summary = CleanupSummary::default();
                summary.node_status = sqlx::query("DELETE FROM node_status WHERE timestamp < $1")
                    .bind(&before)
                    .execute(self.pool())
                    .await?
                    .rows_affected();
                summary.node_events = sqlx::query("DELETE FROM node_events WHERE timestamp < $1")
                    .bind(&before)
                    .execute(self.pool())
                    .await?
                    .rows_affected();
                summary.recovery_attempts =
                    sqlx::query("DELETE FROM recovery_attempts WHERE timestamp < $1")
                        .bind(&before)
                        .execute(self.pool())
                        .await?
                        .rows_affected();
                sqlx::query("VACUUM").execute(self.pool()).await?;
                Ok::<_, sqlx::Error>(summary)
            })
            .context("Failed to clean up old records")?;

        info!(
            "Cleaned up records older than {} days node_status={} node_events={} recovery_attempts={}",
            days, summary.node_status, summary.node_events, summary.recovery_attempts
        );
        Ok(summary)
    }
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 4), 25.0);
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(0, 0), 0.0);
    }

    #[test]
    fn test_cutoff_clamps_huge_windows() {
        assert_eq!(cutoff(u32::MAX), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(cutoff(1_000_000), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_cutoff_ordinary_window() {
        let expected = Utc::now() - Duration::days(7);
        let diff = (cutoff(7) - expected).num_seconds().abs();
        assert!(diff < 5);
    }
}
