// crates/hypepipe-core/src/snapshot.rs
// ============================================================================
// Module: HypePipe Snapshot Interface
// Description: Read contract for pre-fetched dataset snapshots.
// Purpose: Let capability handlers consume snapshot data behind one seam.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Snapshots are timestamped payloads previously fetched from external data
//! providers and stored keyed by dataset identifier. Handlers only ever see
//! the [`SnapshotReader`] interface; a relational implementation lives in the
//! store crate and [`InMemorySnapshotReader`] serves tests and offline runs.
//!
//! A missing or unreadable snapshot is not an error: readers return `None`
//! and handlers degrade to stub payloads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// One stored dataset snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Raw provider payload.
    pub payload: Value,
    /// RFC 3339 fetch timestamp when recorded.
    pub updated_at: Option<String>,
}

// ============================================================================
// SECTION: Reader Trait
// ============================================================================

/// Read access to the snapshot store.
pub trait SnapshotReader: Send + Sync {
    /// Returns the snapshot stored under the dataset key, if any.
    ///
    /// Implementations absorb their own failures: connectivity or decode
    /// problems surface as `None`, never as a panic or error.
    fn get_snapshot(&self, dataset_key: &str) -> Option<Snapshot>;
}

// ============================================================================
// SECTION: In-Memory Reader
// ============================================================================

/// Snapshot reader over an in-memory table.
#[derive(Debug, Default)]
pub struct InMemorySnapshotReader {
    /// Snapshots keyed by dataset identifier.
    snapshots: Mutex<BTreeMap<String, Snapshot>>,
}

impl InMemorySnapshotReader {
    /// Creates an empty in-memory reader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a snapshot.
    pub fn insert(&self, dataset_key: impl Into<String>, snapshot: Snapshot) {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert(dataset_key.into(), snapshot);
        }
    }
}

impl SnapshotReader for InMemorySnapshotReader {
    fn get_snapshot(&self, dataset_key: &str) -> Option<Snapshot> {
        self.snapshots.lock().ok().and_then(|snapshots| snapshots.get(dataset_key).cloned())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions use unwrap for clarity."
    )]

    use serde_json::json;

    use super::InMemorySnapshotReader;
    use super::Snapshot;
    use super::SnapshotReader;

    #[test]
    fn missing_key_returns_none() {
        let reader = InMemorySnapshotReader::new();
        assert!(reader.get_snapshot("coingecko:global").is_none());
    }

    #[test]
    fn inserted_snapshot_round_trips() {
        let reader = InMemorySnapshotReader::new();
        reader.insert(
            "coingecko:global",
            Snapshot {
                payload: json!({"data": {"btc_dominance": 56.7}}),
                updated_at: Some("2026-08-07T00:00:00Z".to_string()),
            },
        );
        let snapshot = reader.get_snapshot("coingecko:global").unwrap();
        assert_eq!(snapshot.payload["data"]["btc_dominance"], json!(56.7));
        assert_eq!(snapshot.updated_at.as_deref(), Some("2026-08-07T00:00:00Z"));
    }
}
