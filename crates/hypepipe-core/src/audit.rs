// crates/hypepipe-core/src/audit.rs
// ============================================================================
// Module: HypePipe Audit Records
// Description: Immutable per-decision audit records and sink interfaces.
// Purpose: Let deployments route audit rows to durable stores without redesign.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Exactly one [`AuditRecord`] is appended per gateway invocation, whatever
//! the outcome. Sinks are best-effort observers: an implementation must never
//! surface a failure to its caller, because audit is observability, not a
//! correctness dependency. The durable SQLite sink lives in the store crate;
//! [`NoopAuditSink`] and [`MemoryAuditSink`] serve tests and offline runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use serde::Serialize;

use crate::decision::Decision;
use crate::decision::DenyReason;
use crate::identifiers::AgentId;
use crate::identifiers::CapabilityName;

// ============================================================================
// SECTION: Audit Record
// ============================================================================

/// One immutable row describing a terminal gateway decision.
///
/// # Invariants
/// - Never updated or deleted by this system; retention is external.
/// - `asof` and `cache_hit` are populated only when the dispatch produced a
///   result (`cache_hit` stays `None` for uncacheable capabilities).
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// Decision timestamp (RFC 3339).
    pub ts: String,
    /// Caller agent identity (header value until authentication succeeds).
    pub agent_id: AgentId,
    /// Numeric user id supplied in the request context.
    pub user_id: Option<i64>,
    /// Capability named by the request.
    pub cap: CapabilityName,
    /// Caller-supplied correlation id.
    pub request_id: String,
    /// Server-generated per-attempt correlation id.
    pub trace_id: String,
    /// Terminal decision.
    pub decision: Decision,
    /// Wall-clock latency from request entry to response emission.
    pub latency_ms: u64,
    /// Policy version carried from the verified claims.
    pub policy_version: Option<String>,
    /// Reason code for denied dispatches.
    pub deny_reason: Option<DenyReason>,
    /// Freshness of the returned result.
    pub asof: Option<String>,
    /// Cache-hit flag; `None` when caching was not applicable.
    pub cache_hit: Option<bool>,
}

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Append-only sink for audit records.
pub trait AuditSink: Send + Sync {
    /// Records one audit row. Implementations absorb all failures.
    fn append(&self, record: &AuditRecord);
}

/// Audit sink that discards every record.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn append(&self, _record: &AuditRecord) {}
}

/// Audit sink that retains records in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Appended records in arrival order.
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Creates an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record appended so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map_or_else(|_| Vec::new(), |records| records.clone())
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, record: &AuditRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
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

    use super::AuditRecord;
    use super::AuditSink;
    use super::MemoryAuditSink;
    use crate::decision::Decision;
    use crate::decision::DenyReason;
    use crate::identifiers::AgentId;
    use crate::identifiers::CapabilityName;

    /// Builds a minimal deny record for sink tests.
    fn deny_record() -> AuditRecord {
        AuditRecord {
            ts: "2026-08-07T00:00:00Z".to_string(),
            agent_id: AgentId::new("agent-1"),
            user_id: None,
            cap: CapabilityName::new("core.asset.snapshot"),
            request_id: "req-1".to_string(),
            trace_id: "trace-1".to_string(),
            decision: Decision::Deny,
            latency_ms: 3,
            policy_version: None,
            deny_reason: Some(DenyReason::MissingToken),
            asof: None,
            cache_hit: None,
        }
    }

    #[test]
    fn memory_sink_retains_records_in_order() {
        let sink = MemoryAuditSink::new();
        sink.append(&deny_record());
        sink.append(&deny_record());
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].decision, Decision::Deny);
    }

    #[test]
    fn record_serializes_stable_labels() {
        let value = serde_json::to_value(deny_record()).unwrap();
        assert_eq!(value["decision"], "deny");
        assert_eq!(value["deny_reason"], "missing_token");
        assert!(value["asof"].is_null());
        assert!(value["cache_hit"].is_null());
    }
}
