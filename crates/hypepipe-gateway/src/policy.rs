// crates/hypepipe-gateway/src/policy.rs
// ============================================================================
// Module: Gateway Scope Policy
// Description: Static capability-to-scope authorization table.
// Purpose: Enforce per-capability scope requirements for verified callers.
// Dependencies: hypepipe-core
// ============================================================================

//! ## Overview
//! Each capability maps to at most one required scope. Capabilities absent
//! from the table are open to any authenticated caller. Matching is
//! exact-string and case-sensitive — no hierarchy, no wildcards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use hypepipe_core::AuthClaims;
use hypepipe_core::CapabilityName;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authorization denial for a scope-guarded capability.
#[derive(Debug, Error)]
#[error("missing required scope '{required_scope}'")]
pub struct ScopeDenied {
    /// The scope the capability requires.
    pub required_scope: String,
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Static capability-to-scope policy table.
pub struct ScopePolicy {
    /// Required scope per guarded capability.
    required: BTreeMap<CapabilityName, String>,
}

impl ScopePolicy {
    /// Creates an empty policy; every capability is open.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            required: BTreeMap::new(),
        }
    }

    /// Builds the policy guarding the built-in capability set.
    #[must_use]
    pub fn builtin() -> Self {
        let mut policy = Self::empty();
        policy.require("core.asset.snapshot", "read:core.asset.snapshot");
        policy.require("macro.regime", "read:macro.regime");
        policy.require("macro.pillars", "read:macro.pillars");
        policy
    }

    /// Guards a capability with a required scope.
    pub fn require(&mut self, cap: impl Into<CapabilityName>, scope: impl Into<String>) {
        self.required.insert(cap.into(), scope.into());
    }

    /// Authorizes the caller for the capability.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeDenied`] when a required scope is absent from the
    /// caller's scope set.
    pub fn authorize(&self, claims: &AuthClaims, cap: &CapabilityName) -> Result<(), ScopeDenied> {
        if let Some(required) = self.required.get(cap)
            && !claims.has_scope(required)
        {
            return Err(ScopeDenied {
                required_scope: required.clone(),
            });
        }
        Ok(())
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

    use hypepipe_core::AuthClaims;
    use hypepipe_core::CapabilityName;
    use hypepipe_core::Tier;
    use hypepipe_core::identifiers::AgentId;

    use super::ScopePolicy;

    /// Builds claims holding the given scopes.
    fn claims(scopes: &[&str]) -> AuthClaims {
        AuthClaims {
            agent_id: AgentId::new("agent-1"),
            scopes: scopes.iter().map(|scope| (*scope).to_string()).collect(),
            tier: Tier::Readonly,
            policy_version: None,
        }
    }

    #[test]
    fn guarded_capability_requires_exact_scope() {
        let policy = ScopePolicy::builtin();
        let cap = CapabilityName::new("core.asset.snapshot");
        assert!(policy.authorize(&claims(&["read:core.asset.snapshot"]), &cap).is_ok());
        let denied = policy.authorize(&claims(&["read:macro.regime"]), &cap).unwrap_err();
        assert_eq!(denied.required_scope, "read:core.asset.snapshot");
        assert!(policy.authorize(&claims(&["READ:core.asset.snapshot"]), &cap).is_err());
    }

    #[test]
    fn unguarded_capability_is_open_to_any_authenticated_caller() {
        let policy = ScopePolicy::builtin();
        let cap = CapabilityName::new("ops.heartbeat");
        assert!(policy.authorize(&claims(&[]), &cap).is_ok());
    }
}
