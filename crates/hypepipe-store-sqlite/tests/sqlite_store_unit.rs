// crates/hypepipe-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Unit tests for the audit and snapshot stores.
// Purpose: Validate schema self-heal idempotence and best-effort appends.
// Dependencies: hypepipe-store-sqlite, hypepipe-core, tempfile
// ============================================================================

//! Audit and snapshot store tests over temporary database files.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

use hypepipe_core::AuditRecord;
use hypepipe_core::AuditSink;
use hypepipe_core::Decision;
use hypepipe_core::DenyReason;
use hypepipe_core::SnapshotReader;
use hypepipe_core::identifiers::AgentId;
use hypepipe_core::identifiers::CapabilityName;
use hypepipe_store_sqlite::SqliteAuditStore;
use hypepipe_store_sqlite::SqliteSnapshotStore;
use serde_json::json;
use tempfile::TempDir;

/// Builds an allow record with result metadata populated.
fn allow_record() -> AuditRecord {
    AuditRecord {
        ts: "2026-08-07T12:00:00Z".to_string(),
        agent_id: AgentId::new("edgenavigator-v1"),
        user_id: Some(42),
        cap: CapabilityName::new("core.asset.snapshot"),
        request_id: "req-100".to_string(),
        trace_id: "trace-abc".to_string(),
        decision: Decision::Allow,
        latency_ms: 12,
        policy_version: Some("v1".to_string()),
        deny_reason: None,
        asof: Some("2026-08-07T11:59:00Z".to_string()),
        cache_hit: Some(false),
    }
}

#[test]
fn ensure_schema_is_idempotent_with_full_column_set() {
    let dir = TempDir::new().unwrap();
    let store = SqliteAuditStore::new(dir.path().join("audit.db"));
    for _ in 0..5 {
        store.ensure_schema().unwrap();
    }
    let columns = store.columns().unwrap();
    for expected in [
        "id",
        "ts",
        "agent_id",
        "user_id",
        "cap",
        "request_id",
        "trace_id",
        "decision",
        "latency_ms",
        "policy_version",
        "deny_reason",
        "asof",
        "cache_hit",
    ] {
        assert!(columns.iter().any(|column| column == expected), "missing column {expected}");
    }
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn fresh_store_instance_heals_schema_again() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.db");
    SqliteAuditStore::new(&path).ensure_schema().unwrap();
    // The memo is per process instance; a second instance re-probes and finds
    // every column already present.
    let second = SqliteAuditStore::new(&path);
    second.ensure_schema().unwrap();
    second.try_append(&allow_record()).unwrap();
    assert_eq!(second.count().unwrap(), 1);
}

#[test]
fn append_round_trips_every_field() {
    let dir = TempDir::new().unwrap();
    let store = SqliteAuditStore::new(dir.path().join("audit.db"));
    store.try_append(&allow_record()).unwrap();

    let mut deny = allow_record();
    deny.decision = Decision::Deny;
    deny.deny_reason = Some(DenyReason::MissingToken);
    deny.asof = None;
    deny.cache_hit = None;
    store.try_append(&deny).unwrap();

    let rows = store.recent(10).unwrap();
    assert_eq!(rows.len(), 2);
    // Newest first.
    assert_eq!(rows[0].decision, "deny");
    assert_eq!(rows[0].deny_reason.as_deref(), Some("missing_token"));
    assert!(rows[0].asof.is_none());
    assert!(rows[0].cache_hit.is_none());
    assert_eq!(rows[1].decision, "allow");
    assert_eq!(rows[1].agent_id, "edgenavigator-v1");
    assert_eq!(rows[1].user_id, Some(42));
    assert_eq!(rows[1].latency_ms, Some(12));
    assert_eq!(rows[1].policy_version.as_deref(), Some("v1"));
    assert_eq!(rows[1].asof.as_deref(), Some("2026-08-07T11:59:00Z"));
    assert_eq!(rows[1].cache_hit, Some(false));
}

#[test]
fn sink_append_swallows_unwritable_target() {
    // A directory path cannot be opened as a database file; the sink must
    // absorb the failure without panicking.
    let dir = TempDir::new().unwrap();
    let store = SqliteAuditStore::new(dir.path());
    store.append(&allow_record());
}

#[test]
fn snapshot_store_round_trips_payloads() {
    let dir = TempDir::new().unwrap();
    let store = SqliteSnapshotStore::new(dir.path().join("snapshots.db"));
    store
        .put_snapshot(
            "coingecko:price_simple:usd:bitcoin",
            &json!({"data": {"price": 68_819, "change_24h": -2.06}}),
            Some("2026-08-07T11:58:00Z"),
        )
        .unwrap();

    let snapshot = store.get_snapshot("coingecko:price_simple:usd:bitcoin").unwrap();
    assert_eq!(snapshot.payload["data"]["price"], json!(68_819));
    assert_eq!(snapshot.updated_at.as_deref(), Some("2026-08-07T11:58:00Z"));
    assert!(store.get_snapshot("coingecko:global").is_none());
}

#[test]
fn snapshot_put_replaces_existing_row() {
    let dir = TempDir::new().unwrap();
    let store = SqliteSnapshotStore::new(dir.path().join("snapshots.db"));
    store.put_snapshot("altme:fear_greed", &json!({"data": [{"value": 20}]}), None).unwrap();
    store
        .put_snapshot(
            "altme:fear_greed",
            &json!({"data": [{"value": 72}]}),
            Some("2026-08-07T12:00:00Z"),
        )
        .unwrap();
    let snapshot = store.get_snapshot("altme:fear_greed").unwrap();
    assert_eq!(snapshot.payload["data"][0]["value"], json!(72));
}
