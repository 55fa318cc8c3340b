// crates/hypepipe-core/src/lib.rs
// ============================================================================
// Module: HypePipe Core
// Description: Domain types and collaborator interfaces for the gateway.
// Purpose: Provide the shared vocabulary every HypePipe crate builds on.
// Dependencies: serde, serde_jcs, serde_json, sha2, time
// ============================================================================

//! ## Overview
//! HypePipe Core defines the identifiers, claims, decision vocabulary,
//! canonical hashing, clock seam, and collaborator interfaces shared by the
//! capability handlers, the durable store, and the dispatch gateway. Nothing
//! here performs I/O; interfaces are implemented by the store and gateway
//! crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod claims;
pub mod decision;
pub mod hashing;
pub mod identifiers;
pub mod outcome;
pub mod snapshot;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditRecord;
pub use audit::AuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use claims::AuthClaims;
pub use claims::Tier;
pub use decision::Decision;
pub use decision::DenyReason;
pub use identifiers::AgentId;
pub use identifiers::CapabilityName;
pub use outcome::HandlerOutcome;
pub use snapshot::InMemorySnapshotReader;
pub use snapshot::Snapshot;
pub use snapshot::SnapshotReader;
pub use time::Clock;
pub use time::ManualClock;
pub use time::SystemClock;
