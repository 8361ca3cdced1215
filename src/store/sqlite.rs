//! SQLite implementation of [`EventStore`].
//!
//! The store owns a current-thread tokio runtime and a single-connection sqlx
//! pool. Each call blocks on its query, so callers see a plain synchronous API
//! and all access to the database file goes through one writer.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::runtime::Runtime;

use crate::models::{Event, EventKind, NodeSnapshot, RecoveryAttempt, Severity};
use crate::store::{EventFilter, EventStore};

/// Format a timestamp for storage. Fixed-width UTC text sorts in time order.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp in database: {}", s))?
        .with_timezone(&Utc))
}

pub struct SqliteStore {
    pool: SqlitePool,
    runtime: Runtime,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and apply migrations
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(45));

        let store = Self::connect(options, Some(path.to_path_buf()))?;
        info!("Connected to database: {}", path.display());
        Ok(store)
    }

    /// Private database that lives as long as the store
    pub fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(options, None)
    }

    fn connect(options: SqliteConnectOptions, path: Option<PathBuf>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build database runtime")?;

        let pool = runtime.block_on(async {
            // One connection: in-memory databases exist per connection and
            // writes are serialized anyway.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
                .context("Failed to open database")?;

            debug!("Running database migrations");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;

            Ok::<_, anyhow::Error>(pool)
        })?;

        Ok(Self {
            pool,
            runtime,
            path,
        })
    }

    /// Database file, if not in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        self.runtime.block_on(self.pool.close());
    }
}

fn snapshot_from_row(row: &SqliteRow) -> Result<NodeSnapshot> {
    let timestamp: String = row.try_get("timestamp")?;
    let raw_state: Option<String> = row.try_get("slurm_state")?;
    Ok(NodeSnapshot::from_stored(
        row.try_get("cluster")?,
        row.try_get("node_name")?,
        parse_timestamp(&timestamp)?,
        raw_state.unwrap_or_default(),
        row.try_get("is_available")?,
        row.try_get("checked_from")?,
    ))
}

pub(crate) fn event_from_row(row: &SqliteRow) -> Result<Event> {
    let timestamp: String = row.try_get("timestamp")?;
    let event_type: String = row.try_get("event_type")?;
    let severity: String = row.try_get("severity")?;
    let details: Option<String> = row.try_get("details")?;
    Ok(Event {
        timestamp: parse_timestamp(&timestamp)?,
        cluster: row.try_get("cluster")?,
        node_name: row.try_get("node_name")?,
        kind: EventKind::parse(&event_type),
        details: details.unwrap_or_default(),
        severity: severity.parse::<Severity>()?,
    })
}

pub(crate) fn attempt_from_row(row: &SqliteRow) -> Result<RecoveryAttempt> {
    let timestamp: String = row.try_get("timestamp")?;
    let output: Option<String> = row.try_get("output")?;
    Ok(RecoveryAttempt {
        timestamp: parse_timestamp(&timestamp)?,
        cluster: row.try_get("cluster")?,
        node_name: row.try_get("node_name")?,
        command: row.try_get("command")?,
        exit_code: row.try_get("exit_code")?,
        output: output.unwrap_or_default(),
        success: row.try_get("success")?,
    })
}

impl EventStore for SqliteStore {
    fn record_snapshots(&self, snapshots: &[NodeSnapshot]) -> Result<()> {
        self.block_on(async {
            let mut tx = self.pool.begin().await?;
            for snapshot in snapshots {
                sqlx::query(
                    r#"
                    INSERT INTO node_status
                        (timestamp, cluster, node_name, status, slurm_state, is_available, checked_from)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(format_timestamp(&snapshot.timestamp))
                .bind(&snapshot.cluster)
                .bind(&snapshot.node_name)
                .bind(snapshot.status_label())
                .bind(&snapshot.raw_state)
                .bind(snapshot.is_available())
                .bind(&snapshot.checked_from)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok::<_, sqlx::Error>(())
        })
        .context("Failed to record node snapshots")
    }

    fn record_event(&self, event: &Event) -> Result<()> {
        self.block_on(
            sqlx::query(
                r#"
                INSERT INTO node_events (timestamp, cluster, node_name, event_type, details, severity)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(format_timestamp(&event.timestamp))
            .bind(&event.cluster)
            .bind(&event.node_name)
            .bind(event.kind.as_str())
            .bind(&event.details)
            .bind(event.severity.as_str())
            .execute(&self.pool),
        )
        .with_context(|| {
            format!(
                "Failed to record {} event for {}/{}",
                event.kind, event.cluster, event.node_name
            )
        })?;
        Ok(())
    }

    fn record_attempt(&self, attempt: &RecoveryAttempt) -> Result<()> {
        self.block_on(
            sqlx::query(
                r#"
                INSERT INTO recovery_attempts
                    (timestamp, cluster, node_name, command, exit_code, output, success)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(format_timestamp(&attempt.timestamp))
            .bind(&attempt.cluster)
            .bind(&attempt.node_name)
            .bind(&attempt.command)
            .bind(attempt.exit_code)
            .bind(&attempt.output)
            .bind(attempt.success)
            .execute(&self.pool),
        )
        .with_context(|| {
            format!(
                "Failed to record recovery attempt for {}/{}",
                attempt.cluster, attempt.node_name
            )
        })?;
        Ok(())
    }

    fn latest_snapshots(&self, cluster: Option<&str>) -> Result<Vec<NodeSnapshot>> {
        let rows = self
            .block_on(
                sqlx::query(
                    r#"
                    SELECT s.timestamp, s.cluster, s.node_name, s.slurm_state,
                           s.is_available, s.checked_from
                    FROM node_status s
                    INNER JOIN (
                        SELECT cluster, MAX(timestamp) AS max_ts
                        FROM node_status
                        GROUP BY cluster
                    ) latest ON s.cluster = latest.cluster AND s.timestamp = latest.max_ts
                    WHERE $1 IS NULL OR s.cluster = $1
                    ORDER BY s.cluster, s.node_name, s.id
                    "#,
                )
                .bind(cluster)
                .fetch_all(&self.pool),
            )
            .context("Failed to query latest node snapshots")?;

        rows.iter().map(snapshot_from_row).collect()
    }

    fn events_since(&self, since: DateTime<Utc>, filter: &EventFilter) -> Result<Vec<Event>> {
        let rows = self
            .block_on(
                sqlx::query(
                    r#"
                    SELECT timestamp, cluster, node_name, event_type, details, severity
                    FROM node_events
                    WHERE timestamp > $1
                      AND ($2 IS NULL OR cluster = $2)
                      AND ($3 IS NULL OR node_name = $3)
                    ORDER BY timestamp, id
                    "#,
                )
                .bind(format_timestamp(&since))
                .bind(filter.cluster.as_deref())
                .bind(filter.node_name.as_deref())
                .fetch_all(&self.pool),
            )
            .context("Failed to query events")?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            let event = event_from_row(row)?;
            if filter.matches(&event) {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn attempts_since(
        &self,
        since: DateTime<Utc>,
        cluster: Option<&str>,
    ) -> Result<Vec<RecoveryAttempt>> {
        let rows = self
            .block_on(
                sqlx::query(
                    r#"
                    SELECT timestamp, cluster, node_name, command, exit_code, output, success
                    FROM recovery_attempts
                    WHERE timestamp > $1 AND ($2 IS NULL OR cluster = $2)
                    ORDER BY timestamp, id
                    "#,
                )
                .bind(format_timestamp(&since))
                .bind(cluster)
                .fetch_all(&self.pool),
            )
            .context("Failed to query recovery attempts")?;

        rows.iter().map(attempt_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format_sorts_lexically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::microseconds(1);
        let (a, b) = (format_timestamp(&early), format_timestamp(&late));
        assert_eq!(a, "2026-01-02T03:04:05.000000Z");
        assert!(a < b);
        assert_eq!(parse_timestamp(&b).unwrap(), late);
    }

    #[test]
    fn test_in_memory_event_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let event = Event::now(
            "spydur",
            "spdr07",
            EventKind::NodeDown,
            "Node in problematic state: down*",
            Severity::Warning,
        );
        store.record_event(&event).unwrap();

        let since = event.timestamp - chrono::Duration::seconds(1);
        let events = store.events_since(since, &EventFilter::default()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::NodeDown);
        assert_eq!(events[0].severity, Severity::Warning);
        // stored with microsecond precision
        assert_eq!(
            format_timestamp(&events[0].timestamp),
            format_timestamp(&event.timestamp)
        );
    }
}
