// crates/hypepipe-core/src/outcome.rs
// ============================================================================
// Module: HypePipe Handler Outcome
// Description: Tagged result of a capability handler invocation.
// Purpose: Make the degraded-data path explicit instead of duck-typed.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Handlers never fail on missing upstream data: they degrade to a stub
//! payload with a synthesized `asof`. [`HandlerOutcome`] makes that contract
//! explicit. The orchestrator treats `Ok` and `Degraded` identically as
//! success; only `Fault` becomes a 500-class error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

// ============================================================================
// SECTION: Handler Outcome
// ============================================================================

/// Result of invoking a capability handler.
///
/// # Invariants
/// - `asof` is always populated on the success variants, even when the
///   underlying source datum was missing.
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    /// Full result computed from live snapshot data.
    Ok {
        /// Capability-specific payload.
        payload: Value,
        /// Freshness of the underlying data.
        asof: String,
    },
    /// Placeholder result produced when upstream data was unavailable.
    Degraded {
        /// Stub payload.
        payload: Value,
        /// Synthesized freshness marker.
        asof: String,
        /// Short label for the degradation cause.
        note: String,
    },
    /// Internal handler fault; the reason is logged server-side only.
    Fault {
        /// Fault description, never surfaced to callers.
        reason: String,
    },
}

impl HandlerOutcome {
    /// Returns the payload and `asof` when the outcome is a success.
    #[must_use]
    pub fn into_success(self) -> Option<(Value, String)> {
        match self {
            Self::Ok {
                payload,
                asof,
            }
            | Self::Degraded {
                payload,
                asof,
                ..
            } => Some((payload, asof)),
            Self::Fault {
                ..
            } => None,
        }
    }

    /// Returns true when the outcome is a fault.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::Fault {
                ..
            }
        )
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

    use super::HandlerOutcome;

    #[test]
    fn degraded_counts_as_success() {
        let outcome = HandlerOutcome::Degraded {
            payload: json!({"note": "stub"}),
            asof: "2026-08-07T00:00:00Z".to_string(),
            note: "missing_snapshot".to_string(),
        };
        let (payload, asof) = outcome.into_success().unwrap();
        assert_eq!(payload["note"], json!("stub"));
        assert_eq!(asof, "2026-08-07T00:00:00Z");
    }

    #[test]
    fn fault_is_not_success() {
        let outcome = HandlerOutcome::Fault {
            reason: "invariant violated".to_string(),
        };
        assert!(outcome.is_fault());
        assert!(outcome.into_success().is_none());
    }
}
