// crates/hypepipe-core/src/decision.rs
// ============================================================================
// Module: HypePipe Decision Vocabulary
// Description: Terminal dispatch decisions and deny-reason codes.
// Purpose: Provide one consistent decision enumeration for audit and responses.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every gateway invocation terminates in exactly one [`Decision`]. Denials
//! additionally carry a [`DenyReason`] code so the audit trail never loses the
//! underlying cause. The two enumerations are deliberately separate: decisions
//! classify outcomes, reasons explain them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Terminal decision for one gateway invocation.
///
/// # Invariants
/// - Labels are stable wire/audit values and must not be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Authentication failed before an authorized identity existed.
    Deny,
    /// Caller authenticated but lacks the required scope.
    ScopeDenied,
    /// Caller named a capability that is not registered.
    UnknownCap,
    /// A capability handler raised an internal fault.
    Error,
    /// Dispatch completed successfully.
    Allow,
}

impl Decision {
    /// Returns the stable audit label for the decision.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deny => "deny",
            Self::ScopeDenied => "scope_denied",
            Self::UnknownCap => "unknown_cap",
            Self::Error => "error",
            Self::Allow => "allow",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Deny Reason
// ============================================================================

/// Stable reason codes for denied dispatches.
///
/// # Invariants
/// - Codes are wire-visible and stable; integrators match on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The claimed-agent-identity header is absent or empty.
    MissingHeader,
    /// The authorization header is absent, not bearer, or empty.
    MissingToken,
    /// The credential failed structural or signature validation.
    InvalidToken,
    /// The credential's expiry has passed.
    Expired,
    /// The transport identity header does not match the verified claim.
    AgentMismatch,
    /// The caller lacks the scope the capability requires.
    ScopeDenied,
    /// The capability is not registered.
    UnknownCap,
}

impl DenyReason {
    /// Returns the stable reason code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingHeader => "missing_header",
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::Expired => "expired",
            Self::AgentMismatch => "agent_mismatch",
            Self::ScopeDenied => "scope_denied",
            Self::UnknownCap => "unknown_cap",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
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

    use super::Decision;
    use super::DenyReason;

    #[test]
    fn decision_serializes_as_snake_case_label() {
        let value = serde_json::to_value(Decision::ScopeDenied).unwrap();
        assert_eq!(value, json!("scope_denied"));
        assert_eq!(Decision::ScopeDenied.as_str(), "scope_denied");
    }

    #[test]
    fn deny_reason_codes_are_stable() {
        let codes: Vec<&str> = [
            DenyReason::MissingHeader,
            DenyReason::MissingToken,
            DenyReason::InvalidToken,
            DenyReason::Expired,
            DenyReason::AgentMismatch,
            DenyReason::ScopeDenied,
            DenyReason::UnknownCap,
        ]
        .into_iter()
        .map(DenyReason::code)
        .collect();
        assert_eq!(
            codes,
            vec![
                "missing_header",
                "missing_token",
                "invalid_token",
                "expired",
                "agent_mismatch",
                "scope_denied",
                "unknown_cap",
            ]
        );
    }
}
