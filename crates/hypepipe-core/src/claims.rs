// crates/hypepipe-core/src/claims.rs
// ============================================================================
// Module: HypePipe Auth Claims
// Description: Verified caller identity, tier, and scope set for one dispatch.
// Purpose: Keep malformed claims out of the system past the verifier boundary.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`AuthClaims`] is the verified identity of a caller for exactly one
//! gateway call. Instances are constructed only by the token verifier, never
//! cached, and never mutated. The tier enumeration is closed: tokens carrying
//! any other tier string fail verification before claims exist.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::AgentId;

// ============================================================================
// SECTION: Tier
// ============================================================================

/// Caller classification carried in the signed token.
///
/// # Invariants
/// - Wire values map 1:1 to `readonly`, `paper`, and `orchestrator`.
/// - Informational beyond being a required, well-typed claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Read-only market intelligence consumer.
    Readonly,
    /// Paper-trading agent.
    Paper,
    /// Orchestrator-grade agent.
    Orchestrator,
}

impl Tier {
    /// Parses a tier from its wire value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "readonly" => Some(Self::Readonly),
            "paper" => Some(Self::Paper),
            "orchestrator" => Some(Self::Orchestrator),
            _ => None,
        }
    }

    /// Returns the stable wire label for the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Readonly => "readonly",
            Self::Paper => "paper",
            Self::Orchestrator => "orchestrator",
        }
    }
}

// ============================================================================
// SECTION: Auth Claims
// ============================================================================

/// Verified caller claims for one gateway call.
///
/// # Invariants
/// - Constructed only by the token verifier from a signature-checked credential.
/// - `scopes` is a set: duplicates collapse, order is irrelevant.
/// - `policy_version` is passed through verbatim for audit correlation and is
///   never validated against a known set.
#[derive(Debug, Clone)]
pub struct AuthClaims {
    /// Verified agent identity.
    pub agent_id: AgentId,
    /// Scopes granted to the caller.
    pub scopes: BTreeSet<String>,
    /// Caller tier.
    pub tier: Tier,
    /// Opaque policy version tag for audit correlation.
    pub policy_version: Option<String>,
}

impl AuthClaims {
    /// Returns true when the caller holds the given scope.
    ///
    /// Matching is exact-string and case-sensitive; there is no hierarchical
    /// or wildcard form.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
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

    use super::AuthClaims;
    use super::Tier;
    use crate::identifiers::AgentId;

    #[test]
    fn tier_parses_closed_set_only() {
        assert_eq!(Tier::parse("readonly"), Some(Tier::Readonly));
        assert_eq!(Tier::parse("paper"), Some(Tier::Paper));
        assert_eq!(Tier::parse("orchestrator"), Some(Tier::Orchestrator));
        assert_eq!(Tier::parse("admin"), None);
        assert_eq!(Tier::parse("Readonly"), None);
        assert_eq!(Tier::parse(""), None);
    }

    #[test]
    fn scope_matching_is_exact() {
        let claims = AuthClaims {
            agent_id: AgentId::new("agent-1"),
            scopes: ["read:core.asset.snapshot".to_string()].into_iter().collect(),
            tier: Tier::Readonly,
            policy_version: None,
        };
        assert!(claims.has_scope("read:core.asset.snapshot"));
        assert!(!claims.has_scope("read:core.asset"));
        assert!(!claims.has_scope("READ:core.asset.snapshot"));
    }
}
