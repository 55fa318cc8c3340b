// crates/hypepipe-gateway/src/cache.rs
// ============================================================================
// Module: Gateway Result Cache
// Description: In-memory keyed TTL cache for capability results.
// Purpose: Bound handler invocations with tunable, clamped freshness.
// Dependencies: hypepipe-core, serde_json
// ============================================================================

//! ## Overview
//! Results are cached per `(capability, canonicalized input)` digest. Entries
//! are never mutated or swept: staleness is checked at read time and entries
//! are replaced wholesale on the next miss. One mutex guards the whole table
//! for both paths — handler latency dominates lock contention at expected
//! request rates, and the lock covers only the get/put critical sections.
//! Sharding by capability is an explicit non-requirement.
//!
//! Callers may request fresher data than the per-capability default via a
//! freshness override, but never staler: the effective max age is
//! `clamp(override, 0, default_ttl)`. A zero effective age forces a miss.
//! The global kill switch disables the table entirely for incident response.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use hypepipe_core::CapabilityName;
use hypepipe_core::Clock;
use hypepipe_core::hashing::HashError;
use hypepipe_core::hashing::hash_canonical_json;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Cache Entry
// ============================================================================

/// One cached capability result.
///
/// # Invariants
/// - Usable only while `now - captured_at_millis <= effective_max_age`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cached result payload.
    pub payload: Value,
    /// Freshness the handler reported for the payload.
    pub asof: String,
    /// Monotonic capture instant in milliseconds.
    captured_at_millis: u64,
}

// ============================================================================
// SECTION: Result Cache
// ============================================================================

/// Shared in-memory result cache.
pub struct ResultCache {
    /// Cached entries keyed by request digest.
    entries: Mutex<BTreeMap<String, CacheEntry>>,
    /// Time source for capture instants and staleness checks.
    clock: Arc<dyn Clock>,
    /// Global kill switch; when set, every dispatch is a fresh invocation.
    disabled: bool,
}

impl ResultCache {
    /// Creates an enabled cache.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_kill_switch(clock, false)
    }

    /// Creates a cache honoring the global kill switch.
    #[must_use]
    pub fn with_kill_switch(clock: Arc<dyn Clock>, disabled: bool) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            clock,
            disabled,
        }
    }

    /// Returns true when the kill switch is engaged.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Computes the digest key for a capability call.
    ///
    /// Structurally equal inputs hash identically regardless of key insertion
    /// order; any value difference produces a different key.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the input cannot be canonicalized.
    pub fn key(cap: &CapabilityName, input: &Map<String, Value>) -> Result<String, HashError> {
        hash_canonical_json(&json!({"cap": cap, "input": input}))
    }

    /// Resolves the effective max age for one request.
    ///
    /// The override is clamped into `[0, default_ttl_secs]`; absent overrides
    /// yield the default.
    #[must_use]
    pub fn effective_max_age_secs(default_ttl_secs: u64, override_secs: Option<i64>) -> u64 {
        let Some(override_secs) = override_secs else {
            return default_ttl_secs;
        };
        let ceiling = i64::try_from(default_ttl_secs).unwrap_or(i64::MAX);
        u64::try_from(override_secs.clamp(0, ceiling)).unwrap_or(0)
    }

    /// Returns the entry under `key` when it is still fresh.
    #[must_use]
    pub fn get(&self, key: &str, max_age_secs: u64) -> Option<CacheEntry> {
        if self.disabled || max_age_secs == 0 {
            return None;
        }
        let now = self.clock.monotonic_millis();
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        let age_millis = now.saturating_sub(entry.captured_at_millis);
        if age_millis <= max_age_secs.saturating_mul(1_000) {
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Stores a result, replacing any previous entry wholesale.
    pub fn put(&self, key: String, payload: Value, asof: String) {
        if self.disabled {
            return;
        }
        let captured_at_millis = self.clock.monotonic_millis();
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                CacheEntry {
                    payload,
                    asof,
                    captured_at_millis,
                },
            );
        }
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
