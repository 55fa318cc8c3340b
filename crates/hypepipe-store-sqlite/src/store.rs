// crates/hypepipe-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Audit and Snapshot Store
// Description: Durable audit sink and snapshot reader backed by SQLite.
// Purpose: Persist gateway decisions and serve pre-fetched dataset snapshots.
// Dependencies: hypepipe-core, rusqlite, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! Two stores share one database file: the append-only
//! `hypepipe_audit_events` table and the `edge_dataset_registry` snapshot
//! table. The audit schema self-heals via additive migration on first use and
//! memoizes success so later appends skip the check. Audit appends and
//! snapshot reads absorb their own failures — audit is observability, and a
//! missing snapshot is a degraded result, not an error.
//!
//! Connections are opened and released per operation; nothing is pooled or
//! held across requests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use hypepipe_core::AuditRecord;
use hypepipe_core::AuditSink;
use hypepipe_core::Snapshot;
use hypepipe_core::SnapshotReader;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Audit table creation statement.
const CREATE_AUDIT_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS hypepipe_audit_events (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    ts              TEXT NOT NULL,
    agent_id        TEXT NOT NULL,
    user_id         INTEGER,
    cap             TEXT NOT NULL,
    request_id      TEXT NOT NULL,
    trace_id        TEXT NOT NULL,
    decision        TEXT NOT NULL,
    latency_ms      INTEGER,
    policy_version  TEXT,
    deny_reason     TEXT
);";

/// Columns added after the table first shipped; probed and added one by one.
const AUDIT_MIGRATE_COLUMNS: [(&str, &str); 4] = [
    ("policy_version", "TEXT"),
    ("deny_reason", "TEXT"),
    ("asof", "TEXT"),
    ("cache_hit", "INTEGER"),
];

/// Snapshot registry table creation statement.
const CREATE_SNAPSHOT_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS edge_dataset_registry (
    dataset_key     TEXT PRIMARY KEY,
    payload         TEXT NOT NULL,
    updated_at      TEXT
);";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Invalid stored data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

// ============================================================================
// SECTION: Audit Store
// ============================================================================

/// Durable audit sink over the `hypepipe_audit_events` table.
///
/// # Invariants
/// - Rows are append-only; this store never updates or deletes them.
/// - The schema-ensured flag is set only after a successful migration, so a
///   failed check is retried on the next append.
pub struct SqliteAuditStore {
    /// Database file path.
    path: PathBuf,
    /// Set once the schema has been verified this process lifetime.
    schema_ensured: AtomicBool,
}

impl SqliteAuditStore {
    /// Creates an audit store over the given database file.
    ///
    /// No I/O happens here; the schema is ensured lazily on first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            schema_ensured: AtomicBool::new(false),
        }
    }

    /// Ensures the audit table and its full column set exist.
    ///
    /// Safe to call any number of times; after the first success the check is
    /// memoized for the rest of the process lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// migrated.
    pub fn ensure_schema(&self) -> Result<(), SqliteStoreError> {
        if self.schema_ensured.load(Ordering::Acquire) {
            return Ok(());
        }
        let conn = self.open()?;
        conn.execute_batch(CREATE_AUDIT_TABLE_SQL)?;
        let existing = table_columns(&conn, "hypepipe_audit_events")?;
        for (name, sql_type) in AUDIT_MIGRATE_COLUMNS {
            if !existing.iter().any(|column| column == name) {
                conn.execute_batch(&format!(
                    "ALTER TABLE hypepipe_audit_events ADD COLUMN {name} {sql_type};"
                ))?;
            }
        }
        self.schema_ensured.store(true, Ordering::Release);
        Ok(())
    }

    /// Appends one audit row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the schema check or the insert fails.
    pub fn try_append(&self, record: &AuditRecord) -> Result<(), SqliteStoreError> {
        self.ensure_schema()?;
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO hypepipe_audit_events
               (ts, agent_id, user_id, cap, request_id, trace_id, decision,
                latency_ms, policy_version, deny_reason, asof, cache_hit)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.ts,
                record.agent_id.as_str(),
                record.user_id,
                record.cap.as_str(),
                record.request_id,
                record.trace_id,
                record.decision.as_str(),
                i64::try_from(record.latency_ms).unwrap_or(i64::MAX),
                record.policy_version,
                record.deny_reason.map(|reason| reason.code()),
                record.asof,
                record.cache_hit,
            ],
        )?;
        Ok(())
    }

    /// Returns the audit table's column names.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be read.
    pub fn columns(&self) -> Result<Vec<String>, SqliteStoreError> {
        let conn = self.open()?;
        table_columns(&conn, "hypepipe_audit_events")
    }

    /// Returns the stored row count.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be read.
    pub fn count(&self) -> Result<u64, SqliteStoreError> {
        let conn = self.open()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM hypepipe_audit_events", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Returns the most recent audit rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be read.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditRow>, SqliteStoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT ts, agent_id, user_id, cap, request_id, trace_id, decision,
                    latency_ms, policy_version, deny_reason, asof, cache_hit
               FROM hypepipe_audit_events
              ORDER BY id DESC
              LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            Ok(AuditRow {
                ts: row.get(0)?,
                agent_id: row.get(1)?,
                user_id: row.get(2)?,
                cap: row.get(3)?,
                request_id: row.get(4)?,
                trace_id: row.get(5)?,
                decision: row.get(6)?,
                latency_ms: row.get(7)?,
                policy_version: row.get(8)?,
                deny_reason: row.get(9)?,
                asof: row.get(10)?,
                cache_hit: row.get(11)?,
            })
        })?;
        let mut collected = Vec::new();
        for row in rows {
            collected.push(row?);
        }
        Ok(collected)
    }

    /// Opens a fresh connection for one operation.
    fn open(&self) -> Result<Connection, SqliteStoreError> {
        ensure_parent_dir(&self.path)?;
        Ok(Connection::open(&self.path)?)
    }
}

impl AuditSink for SqliteAuditStore {
    fn append(&self, record: &AuditRecord) {
        if let Err(error) = self.try_append(record) {
            warn!(cap = record.cap.as_str(), %error, "audit append failed");
        }
    }
}

/// One stored audit row as read back from the table.
#[derive(Debug, Clone)]
pub struct AuditRow {
    /// Decision timestamp.
    pub ts: String,
    /// Caller agent identity.
    pub agent_id: String,
    /// Numeric user id when supplied.
    pub user_id: Option<i64>,
    /// Capability named by the request.
    pub cap: String,
    /// Caller-supplied correlation id.
    pub request_id: String,
    /// Server-generated per-attempt correlation id.
    pub trace_id: String,
    /// Terminal decision label.
    pub decision: String,
    /// Wall-clock latency in milliseconds.
    pub latency_ms: Option<i64>,
    /// Policy version carried from the verified claims.
    pub policy_version: Option<String>,
    /// Deny reason code when denied.
    pub deny_reason: Option<String>,
    /// Result freshness when a result was produced.
    pub asof: Option<String>,
    /// Cache-hit flag; `None` when caching was not applicable.
    pub cache_hit: Option<bool>,
}

// ============================================================================
// SECTION: Snapshot Store
// ============================================================================

/// Snapshot reader over the `edge_dataset_registry` table.
pub struct SqliteSnapshotStore {
    /// Database file path.
    path: PathBuf,
}

impl SqliteSnapshotStore {
    /// Creates a snapshot store over the given database file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Inserts or replaces one snapshot row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the write fails.
    pub fn put_snapshot(
        &self,
        dataset_key: &str,
        payload: &Value,
        updated_at: Option<&str>,
    ) -> Result<(), SqliteStoreError> {
        let conn = self.open()?;
        conn.execute_batch(CREATE_SNAPSHOT_TABLE_SQL)?;
        let payload_text = serde_json::to_string(payload)
            .map_err(|error| SqliteStoreError::Invalid(error.to_string()))?;
        conn.execute(
            "INSERT INTO edge_dataset_registry (dataset_key, payload, updated_at)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(dataset_key) DO UPDATE
                 SET payload = excluded.payload, updated_at = excluded.updated_at",
            params![dataset_key, payload_text, updated_at],
        )?;
        Ok(())
    }

    /// Reads one snapshot row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the read or payload decode fails.
    pub fn try_get(&self, dataset_key: &str) -> Result<Option<Snapshot>, SqliteStoreError> {
        let conn = self.open()?;
        conn.execute_batch(CREATE_SNAPSHOT_TABLE_SQL)?;
        let row: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT payload, updated_at FROM edge_dataset_registry WHERE dataset_key = ?1",
                params![dataset_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((payload_text, updated_at)) = row else {
            return Ok(None);
        };
        let payload = serde_json::from_str(&payload_text)
            .map_err(|error| SqliteStoreError::Invalid(error.to_string()))?;
        Ok(Some(Snapshot {
            payload,
            updated_at,
        }))
    }

    /// Opens a fresh connection for one operation.
    fn open(&self) -> Result<Connection, SqliteStoreError> {
        ensure_parent_dir(&self.path)?;
        Ok(Connection::open(&self.path)?)
    }
}

impl SnapshotReader for SqliteSnapshotStore {
    fn get_snapshot(&self, dataset_key: &str) -> Option<Snapshot> {
        match self.try_get(dataset_key) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(dataset_key, %error, "snapshot read failed");
                None
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the column names of a table via `PRAGMA table_info`.
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, SqliteStoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut columns = Vec::new();
    for name in names {
        columns.push(name?);
    }
    Ok(columns)
}

/// Creates the parent directory of the database file when missing.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|error| SqliteStoreError::Io(error.to_string()))?;
    }
    Ok(())
}
