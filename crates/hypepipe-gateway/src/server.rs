// crates/hypepipe-gateway/src/server.rs
// ============================================================================
// Module: Gateway HTTP Server
// Description: Axum HTTP surface for the capability dispatch gateway.
// Purpose: Expose /health and /cap with transport caching disabled.
// Dependencies: hypepipe-core, axum, tokio
// ============================================================================

//! ## Overview
//! Two routes: `GET /health` (liveness, no auth) and `POST /cap` (capability
//! dispatch). Every response carries `Cache-Control: no-store` — result
//! freshness is the gateway cache's concern, never the transport's. Dispatch
//! performs blocking store I/O, so requests shift to a blocking context on
//! multithread runtimes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CACHE_CONTROL;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde_json::json;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::dispatch::CapRequest;
use crate::dispatch::CapResponse;
use crate::dispatch::Gateway;
use crate::dispatch::RequestContext;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the caller's claimed agent identity.
const AGENT_ID_HEADER: &str = "x-agent-id";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway server errors.
#[derive(Debug, Error)]
pub enum GatewayServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server wrapping one gateway instance.
pub struct HypePipeServer {
    /// Server configuration.
    config: GatewayConfig,
    /// Dispatch gateway.
    gateway: Arc<Gateway>,
}

impl HypePipeServer {
    /// Builds a server over the given gateway.
    #[must_use]
    pub fn new(config: GatewayConfig, gateway: Gateway) -> Self {
        Self {
            config,
            gateway: Arc::new(gateway),
        }
    }

    /// Serves HTTP requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError`] when the bind address is invalid or the
    /// server fails.
    pub async fn serve(self) -> Result<(), GatewayServerError> {
        let addr: SocketAddr = self
            .config
            .bind
            .parse()
            .map_err(|_| GatewayServerError::Config("invalid bind address".to_string()))?;
        let state = Arc::new(ServerState {
            gateway: Arc::clone(&self.gateway),
        });
        let app = router(state);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| GatewayServerError::Transport("http bind failed".to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|_| GatewayServerError::Transport("http server failed".to_string()))
    }
}

/// Shared state for HTTP handlers.
struct ServerState {
    /// Dispatch gateway.
    gateway: Arc<Gateway>,
}

/// Builds the gateway router.
fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/cap", post(handle_cap))
        .with_state(state)
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles the liveness probe.
async fn handle_health(State(state): State<Arc<ServerState>>) -> Response {
    let body = json!({
        "ok": true,
        "service": "hypepipe",
        "ts": state.gateway.now_rfc3339(),
    });
    no_store(StatusCode::OK, &body)
}

/// Handles capability dispatch requests.
async fn handle_cap(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    let context = RequestContext {
        agent_header: header_value(&headers, AGENT_ID_HEADER),
        auth_header: headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };
    let request: CapRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(_) => {
            let body = json!({"ok": false, "error": "invalid request body"});
            return no_store(StatusCode::BAD_REQUEST, &body);
        }
    };
    let (status, response) = dispatch_with_blocking(&state.gateway, &context, &request);
    respond(status, &response)
}

/// Runs a dispatch, shifting to a blocking context when available.
fn dispatch_with_blocking(
    gateway: &Gateway,
    context: &RequestContext,
    request: &CapRequest,
) -> (StatusCode, CapResponse) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| gateway.dispatch(context, request))
        }
        _ => gateway.dispatch(context, request),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a header value as UTF-8.
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
}

/// Serializes an envelope with transport caching disabled.
fn respond(status: StatusCode, response: &CapResponse) -> Response {
    match serde_json::to_value(response) {
        Ok(body) => no_store(status, &body),
        Err(_) => no_store(
            StatusCode::INTERNAL_SERVER_ERROR,
            &json!({"ok": false, "error": "serialization failed"}),
        ),
    }
}

/// Builds a JSON response with `Cache-Control: no-store`.
fn no_store(status: StatusCode, body: &serde_json::Value) -> Response {
    (status, [(CACHE_CONTROL, "no-store")], axum::Json(body.clone())).into_response()
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

    use axum::http::StatusCode;
    use serde_json::json;

    use super::no_store;

    #[test]
    fn every_response_disables_transport_caching() {
        let response = no_store(StatusCode::OK, &json!({"ok": true}));
        assert_eq!(response.status(), StatusCode::OK);
        let cache_control = response.headers().get("cache-control").unwrap();
        assert_eq!(cache_control, "no-store");
    }
}
