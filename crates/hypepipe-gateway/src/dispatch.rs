// crates/hypepipe-gateway/src/dispatch.rs
// ============================================================================
// Module: Gateway Dispatch Orchestrator
// Description: Capability dispatch state machine with auditing and caching.
// Purpose: Validate, authenticate, authorize, dispatch, cache, and audit.
// Dependencies: hypepipe-core, hypepipe-caps, axum, rand
// ============================================================================

//! ## Overview
//! One dispatch walks a strict sequence: request-shape validation,
//! authentication, scope authorization, capability resolution, cache lookup,
//! handler invocation, response. Exactly one audit record is appended per
//! invocation past the shape check, and audit failures never alter the
//! response. Every path measures wall-clock latency from request entry and
//! carries a fresh server-generated trace id, distinct from the
//! caller-supplied request id so retried requests stay distinguishable per
//! attempt.
//!
//! Concurrent identical misses are not coalesced: handlers are cheap,
//! idempotent reads, and a duplicate computation is acceptable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::http::StatusCode;
use hypepipe_caps::CapabilityRegistry;
use hypepipe_core::AuditRecord;
use hypepipe_core::AuditSink;
use hypepipe_core::CapabilityName;
use hypepipe_core::Clock;
use hypepipe_core::Decision;
use hypepipe_core::DenyReason;
use hypepipe_core::HandlerOutcome;
use hypepipe_core::hashing::hex_encode;
use hypepipe_core::identifiers::AgentId;
use rand::RngCore;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tracing::error;

use crate::auth::TokenVerifier;
use crate::cache::ResultCache;
use crate::policy::ScopePolicy;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Caller-supplied request context.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapContext {
    /// Claimed agent identity; informational, reconciled against the token.
    pub agent_id: Option<String>,
    /// Numeric user id for audit correlation.
    pub user_id: Option<i64>,
    /// Claimed tier; informational only.
    pub tier: Option<String>,
}

/// Caller-supplied dispatch options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapOpts {
    /// Freshness override in seconds, clamped into `[0, default_ttl]`.
    pub freshness_s: Option<i64>,
    /// Trace flag; reserved, currently informational.
    pub trace: Option<bool>,
}

/// One inbound capability call.
#[derive(Debug, Clone, Deserialize)]
pub struct CapRequest {
    /// Capability name to dispatch.
    pub cap: String,
    /// Capability-specific input mapping.
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Caller context.
    #[serde(default)]
    pub ctx: CapContext,
    /// Dispatch options.
    #[serde(default)]
    pub opts: CapOpts,
    /// Caller-supplied correlation id; required non-empty. Retries reuse it,
    /// so the server never generates one.
    #[serde(default)]
    pub request_id: String,
}

/// Response metadata attached to every envelope.
#[derive(Debug, Clone, Serialize)]
pub struct CapMeta {
    /// Capability named by the request.
    pub cap: String,
    /// Server-generated per-attempt correlation id.
    pub trace_id: String,
    /// Freshness of the returned result.
    pub asof: Option<String>,
    /// Cache-hit flag; `null` when caching was not applicable.
    pub cache_hit: Option<bool>,
}

/// Uniform response envelope for the dispatch endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CapResponse {
    /// Whether the dispatch succeeded.
    pub ok: bool,
    /// Capability result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Human-readable failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable deny-reason code on denied dispatches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny_reason: Option<DenyReason>,
    /// Registered capability names, ascending, on unknown-capability errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_caps: Option<Vec<String>>,
    /// Response metadata.
    pub meta: CapMeta,
}

impl CapResponse {
    /// Builds a success envelope.
    fn success(cap: &str, trace_id: &str, data: Value, asof: String, cache_hit: Option<bool>) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            deny_reason: None,
            known_caps: None,
            meta: CapMeta {
                cap: cap.to_string(),
                trace_id: trace_id.to_string(),
                asof: Some(asof),
                cache_hit,
            },
        }
    }

    /// Builds a failure envelope.
    fn failure(
        cap: &str,
        trace_id: &str,
        message: String,
        deny_reason: Option<DenyReason>,
        known_caps: Option<Vec<String>>,
    ) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message),
            deny_reason,
            known_caps,
            meta: CapMeta {
                cap: cap.to_string(),
                trace_id: trace_id.to_string(),
                asof: None,
                cache_hit: None,
            },
        }
    }
}

/// Transport-level request context for one dispatch.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// `X-Agent-Id` header value.
    pub agent_header: Option<String>,
    /// `Authorization` header value.
    pub auth_header: Option<String>,
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// The capability dispatch gateway.
pub struct Gateway {
    /// Bearer credential verifier.
    verifier: TokenVerifier,
    /// Capability scope policy.
    policy: ScopePolicy,
    /// Static capability registry.
    registry: CapabilityRegistry,
    /// Shared result cache.
    cache: ResultCache,
    /// Audit sink; best-effort, never blocks the response.
    audit: Arc<dyn AuditSink>,
    /// Time source for latency and timestamps.
    clock: Arc<dyn Clock>,
}

impl Gateway {
    /// Composes a gateway from its collaborators.
    #[must_use]
    pub fn new(
        verifier: TokenVerifier,
        policy: ScopePolicy,
        registry: CapabilityRegistry,
        cache: ResultCache,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifier,
            policy,
            registry,
            cache,
            audit,
            clock,
        }
    }

    /// Returns the current wall-clock time, RFC 3339.
    #[must_use]
    pub fn now_rfc3339(&self) -> String {
        self.clock.now_rfc3339()
    }

    /// Dispatches one capability call end to end.
    #[must_use]
    pub fn dispatch(
        &self,
        context: &RequestContext,
        request: &CapRequest,
    ) -> (StatusCode, CapResponse) {
        let started = self.clock.monotonic_millis();
        let trace_id = new_trace_id();
        let cap_name = CapabilityName::new(request.cap.as_str());

        // Step 1: request shape. No audit — the request never reached an
        // authenticatable identity.
        if request.request_id.trim().is_empty() {
            return (
                StatusCode::BAD_REQUEST,
                CapResponse::failure(&request.cap, &trace_id, "request_id required".to_string(), None, None),
            );
        }

        // Step 2: authenticate.
        let claims = match self
            .verifier
            .verify(context.agent_header.as_deref(), context.auth_header.as_deref())
        {
            Ok(claims) => claims,
            Err(auth_error) => {
                let reason = auth_error.deny_reason();
                self.append_audit(AuditRecord {
                    ts: self.clock.now_rfc3339(),
                    agent_id: AgentId::new(
                        context.agent_header.as_deref().unwrap_or("unknown"),
                    ),
                    user_id: request.ctx.user_id,
                    cap: cap_name,
                    request_id: request.request_id.clone(),
                    trace_id: trace_id.clone(),
                    decision: Decision::Deny,
                    latency_ms: self.elapsed_since(started),
                    policy_version: None,
                    deny_reason: Some(reason),
                    asof: None,
                    cache_hit: None,
                });
                return (
                    StatusCode::UNAUTHORIZED,
                    CapResponse::failure(
                        &request.cap,
                        &trace_id,
                        auth_error.to_string(),
                        Some(reason),
                        None,
                    ),
                );
            }
        };

        // Step 3: authorize.
        if let Err(denied) = self.policy.authorize(&claims, &cap_name) {
            self.append_audit(AuditRecord {
                ts: self.clock.now_rfc3339(),
                agent_id: claims.agent_id.clone(),
                user_id: request.ctx.user_id,
                cap: cap_name,
                request_id: request.request_id.clone(),
                trace_id: trace_id.clone(),
                decision: Decision::ScopeDenied,
                latency_ms: self.elapsed_since(started),
                policy_version: claims.policy_version.clone(),
                deny_reason: Some(DenyReason::ScopeDenied),
                asof: None,
                cache_hit: None,
            });
            return (
                StatusCode::FORBIDDEN,
                CapResponse::failure(
                    &request.cap,
                    &trace_id,
                    denied.to_string(),
                    Some(DenyReason::ScopeDenied),
                    None,
                ),
            );
        }

        // Step 4: resolve capability.
        let Some(registration) = self.registry.resolve(&cap_name) else {
            self.append_audit(AuditRecord {
                ts: self.clock.now_rfc3339(),
                agent_id: claims.agent_id.clone(),
                user_id: request.ctx.user_id,
                cap: cap_name,
                request_id: request.request_id.clone(),
                trace_id: trace_id.clone(),
                decision: Decision::UnknownCap,
                latency_ms: self.elapsed_since(started),
                policy_version: claims.policy_version.clone(),
                deny_reason: Some(DenyReason::UnknownCap),
                asof: None,
                cache_hit: None,
            });
            return (
                StatusCode::BAD_REQUEST,
                CapResponse::failure(
                    &request.cap,
                    &trace_id,
                    format!("unknown capability: {}", request.cap),
                    Some(DenyReason::UnknownCap),
                    Some(self.registry.sorted_names()),
                ),
            );
        };

        // Step 5: cache lookup. Caching applies only with a positive default
        // TTL and the kill switch disengaged; a zero effective age skips the
        // lookup but still lets the fresh result be stored.
        let default_ttl = registration.default_ttl_secs();
        let caching_applicable = default_ttl > 0 && !self.cache.is_disabled();
        let effective_max_age =
            ResultCache::effective_max_age_secs(default_ttl, request.opts.freshness_s);
        let cache_key = if caching_applicable {
            ResultCache::key(&cap_name, &request.input).ok()
        } else {
            None
        };

        if let Some(key) = &cache_key
            && let Some(entry) = self.cache.get(key, effective_max_age)
        {
            self.append_audit(AuditRecord {
                ts: self.clock.now_rfc3339(),
                agent_id: claims.agent_id.clone(),
                user_id: request.ctx.user_id,
                cap: cap_name,
                request_id: request.request_id.clone(),
                trace_id: trace_id.clone(),
                decision: Decision::Allow,
                latency_ms: self.elapsed_since(started),
                policy_version: claims.policy_version.clone(),
                deny_reason: None,
                asof: Some(entry.asof.clone()),
                cache_hit: Some(true),
            });
            return (
                StatusCode::OK,
                CapResponse::success(&request.cap, &trace_id, entry.payload, entry.asof, Some(true)),
            );
        }

        // Step 6: invoke the handler.
        let (payload, asof) = match registration.handler().invoke(&request.input) {
            HandlerOutcome::Fault {
                reason,
            } => {
                // Full detail stays server-side; the caller sees an opaque 500.
                error!(
                    cap = request.cap.as_str(),
                    trace_id = trace_id.as_str(),
                    reason = reason.as_str(),
                    "capability handler fault"
                );
                self.append_audit(AuditRecord {
                    ts: self.clock.now_rfc3339(),
                    agent_id: claims.agent_id.clone(),
                    user_id: request.ctx.user_id,
                    cap: cap_name,
                    request_id: request.request_id.clone(),
                    trace_id: trace_id.clone(),
                    decision: Decision::Error,
                    latency_ms: self.elapsed_since(started),
                    policy_version: claims.policy_version.clone(),
                    deny_reason: None,
                    asof: None,
                    cache_hit: None,
                });
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    CapResponse::failure(
                        &request.cap,
                        &trace_id,
                        "internal capability error".to_string(),
                        None,
                        None,
                    ),
                );
            }
            HandlerOutcome::Ok {
                payload,
                asof,
            }
            | HandlerOutcome::Degraded {
                payload,
                asof,
                ..
            } => (payload, asof),
        };

        if let Some(key) = cache_key.clone() {
            self.cache.put(key, payload.clone(), asof.clone());
        }
        let cache_hit = caching_applicable.then_some(false);

        // Step 7: respond and audit success.
        self.append_audit(AuditRecord {
            ts: self.clock.now_rfc3339(),
            agent_id: claims.agent_id.clone(),
            user_id: request.ctx.user_id,
            cap: cap_name,
            request_id: request.request_id.clone(),
            trace_id: trace_id.clone(),
            decision: Decision::Allow,
            latency_ms: self.elapsed_since(started),
            policy_version: claims.policy_version.clone(),
            deny_reason: None,
            asof: Some(asof.clone()),
            cache_hit,
        });
        (StatusCode::OK, CapResponse::success(&request.cap, &trace_id, payload, asof, cache_hit))
    }

    /// Milliseconds elapsed since the request entered the gateway.
    fn elapsed_since(&self, started: u64) -> u64 {
        self.clock.monotonic_millis().saturating_sub(started)
    }

    /// Appends one audit record; sinks absorb their own failures.
    fn append_audit(&self, record: AuditRecord) {
        self.audit.append(&record);
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Generates a fresh 16-byte hex trace id.
fn new_trace_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
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

    use super::new_trace_id;

    #[test]
    fn trace_ids_are_hex_and_unique_per_attempt() {
        let first = new_trace_id();
        let second = new_trace_id();
        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|ch| ch.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }
}
