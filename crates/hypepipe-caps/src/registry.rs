// crates/hypepipe-caps/src/registry.rs
// ============================================================================
// Module: Capability Registry
// Description: Static capability table mapping names to handlers and TTLs.
// Purpose: Resolve dispatch targets and cache policy for the gateway.
// Dependencies: hypepipe-core
// ============================================================================

//! ## Overview
//! Capabilities are a fixed set registered at process start; nothing is added
//! or removed at runtime. Each registration pairs a handler with the default
//! cache TTL for its results — a zero TTL disables caching for that
//! capability entirely.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use hypepipe_core::CapabilityName;
use hypepipe_core::Clock;
use hypepipe_core::HandlerOutcome;
use hypepipe_core::SnapshotReader;
use serde_json::Map;
use serde_json::Value;

use crate::asset::AssetSnapshotHandler;
use crate::pillars::MacroPillarsHandler;
use crate::regime::MacroRegimeHandler;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default cache TTL for `core.asset.snapshot` results (seconds).
pub const ASSET_SNAPSHOT_TTL_SECS: u64 = 30;
/// Default cache TTL for `macro.regime` results (seconds).
pub const MACRO_REGIME_TTL_SECS: u64 = 60;
/// Default cache TTL for `macro.pillars` results (seconds).
pub const MACRO_PILLARS_TTL_SECS: u64 = 60;

// ============================================================================
// SECTION: Handler Trait
// ============================================================================

/// A capability handler invoked by the dispatch gateway.
///
/// Handlers are pure functions of their input mapping plus read access to the
/// snapshot store. Missing upstream data must degrade, never fault; a fault
/// is reserved for genuine internal failures.
pub trait CapabilityHandler: Send + Sync {
    /// Computes the capability result for the given input mapping.
    fn invoke(&self, input: &Map<String, Value>) -> HandlerOutcome;
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// One registered capability: its handler and cache policy.
pub struct CapabilityRegistration {
    /// Handler invoked on dispatch.
    handler: Arc<dyn CapabilityHandler>,
    /// Default cache TTL in seconds; zero disables caching.
    default_ttl_secs: u64,
}

impl CapabilityRegistration {
    /// Returns the registered handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn CapabilityHandler> {
        &self.handler
    }

    /// Returns the default cache TTL in seconds.
    #[must_use]
    pub const fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Static registry of dispatchable capabilities.
pub struct CapabilityRegistry {
    /// Registrations keyed by capability name.
    capabilities: BTreeMap<CapabilityName, CapabilityRegistration>,
}

impl CapabilityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: BTreeMap::new(),
        }
    }

    /// Builds the registry with the built-in capability set.
    #[must_use]
    pub fn builtin(reader: Arc<dyn SnapshotReader>, clock: Arc<dyn Clock>) -> Self {
        let mut registry = Self::new();
        registry.register(
            "core.asset.snapshot",
            Arc::new(AssetSnapshotHandler::new(Arc::clone(&reader), Arc::clone(&clock))),
            ASSET_SNAPSHOT_TTL_SECS,
        );
        registry.register(
            "macro.regime",
            Arc::new(MacroRegimeHandler::new(Arc::clone(&reader), Arc::clone(&clock))),
            MACRO_REGIME_TTL_SECS,
        );
        registry.register(
            "macro.pillars",
            Arc::new(MacroPillarsHandler::new(reader, clock)),
            MACRO_PILLARS_TTL_SECS,
        );
        registry
    }

    /// Registers a capability, replacing any previous registration.
    pub fn register(
        &mut self,
        name: impl Into<CapabilityName>,
        handler: Arc<dyn CapabilityHandler>,
        default_ttl_secs: u64,
    ) {
        self.capabilities.insert(
            name.into(),
            CapabilityRegistration {
                handler,
                default_ttl_secs,
            },
        );
    }

    /// Resolves a capability by name.
    #[must_use]
    pub fn resolve(&self, name: &CapabilityName) -> Option<&CapabilityRegistration> {
        self.capabilities.get(name)
    }

    /// Lists registered capability names in ascending order.
    #[must_use]
    pub fn sorted_names(&self) -> Vec<String> {
        self.capabilities.keys().map(|name| name.as_str().to_string()).collect()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
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

    use std::sync::Arc;

    use hypepipe_core::CapabilityName;
    use hypepipe_core::InMemorySnapshotReader;
    use hypepipe_core::ManualClock;

    use super::CapabilityRegistry;

    #[test]
    fn builtin_registry_lists_names_sorted() {
        let reader = Arc::new(InMemorySnapshotReader::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000, "2023-11-14T22:13:20Z"));
        let registry = CapabilityRegistry::builtin(reader, clock);
        assert_eq!(
            registry.sorted_names(),
            vec!["core.asset.snapshot", "macro.pillars", "macro.regime"]
        );
    }

    #[test]
    fn unknown_capability_does_not_resolve() {
        let registry = CapabilityRegistry::new();
        assert!(registry.resolve(&CapabilityName::new("core.asset.snapshot")).is_none());
    }

    #[test]
    fn builtin_ttls_match_cache_policy() {
        let reader = Arc::new(InMemorySnapshotReader::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000, "2023-11-14T22:13:20Z"));
        let registry = CapabilityRegistry::builtin(reader, clock);
        let asset = registry.resolve(&CapabilityName::new("core.asset.snapshot")).unwrap();
        assert_eq!(asset.default_ttl_secs(), 30);
        let regime = registry.resolve(&CapabilityName::new("macro.regime")).unwrap();
        assert_eq!(regime.default_ttl_secs(), 60);
    }
}
