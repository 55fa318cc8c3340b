// crates/hypepipe-gateway/src/auth.rs
// ============================================================================
// Module: Gateway Token Verifier
// Description: HS256 bearer token verification and claim validation.
// Purpose: Produce verified AuthClaims or a specific deny reason, fail closed.
// Dependencies: hypepipe-core, base64, hmac, sha2, serde_json
// ============================================================================

//! ## Overview
//! Callers authenticate with a compact JWS (HS256) bearer credential carrying
//! `agent_id`, `scopes`, `tier`, `exp`, and optionally `policy_version`. The
//! verifier checks the signature with the server-held symmetric secret, then
//! validates claim shape, expiry, and the binding between the `X-Agent-Id`
//! transport header and the signed identity claim.
//!
//! A missing signing secret is a startup-class configuration failure, not a
//! per-request deny: [`TokenVerifier`] cannot be constructed without one, so
//! the server refuses to start instead of mass-denying callers with a
//! misleading 401.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::Hmac;
use hmac::Mac;
use hypepipe_core::AgentId;
use hypepipe_core::AuthClaims;
use hypepipe_core::Clock;
use hypepipe_core::DenyReason;
use hypepipe_core::Tier;
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the signing secret.
pub const JWT_SECRET_ENV: &str = "HYPEPIPE_JWT_SECRET";
/// Secret file fallback, relative to the deployment root. Used when the
/// process environment cannot be edited at runtime.
pub const JWT_SECRET_FILE: &str = ".hypepipe_jwt_secret";
/// Maximum accepted authorization header size.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

/// HMAC-SHA256 instance used for token tags.
type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Per-request authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The claimed-agent-identity header is absent or empty.
    #[error("missing X-Agent-Id header")]
    MissingHeader,
    /// The authorization header is absent, not bearer, or empty.
    #[error("missing or invalid Authorization bearer token")]
    MissingToken,
    /// The credential failed structural or signature validation.
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// The credential's expiry has passed.
    #[error("token expired")]
    Expired,
    /// The transport identity header does not match the signed claim.
    #[error("X-Agent-Id header does not match token agent_id claim")]
    AgentMismatch,
}

impl AuthError {
    /// Returns the stable deny-reason code for this failure.
    #[must_use]
    pub const fn deny_reason(&self) -> DenyReason {
        match self {
            Self::MissingHeader => DenyReason::MissingHeader,
            Self::MissingToken => DenyReason::MissingToken,
            Self::InvalidToken(_) => DenyReason::InvalidToken,
            Self::Expired => DenyReason::Expired,
            Self::AgentMismatch => DenyReason::AgentMismatch,
        }
    }
}

/// Startup-class auth configuration failures.
#[derive(Debug, Error)]
pub enum AuthConfigError {
    /// No signing secret is configured anywhere.
    #[error(
        "signing secret is not configured: set {JWT_SECRET_ENV} or provide {JWT_SECRET_FILE} in \
         the deployment root"
    )]
    MissingSecret,
}

/// Token signing failures.
#[derive(Debug, Error)]
#[error("token signing failed: {0}")]
pub struct SignError(String);

// ============================================================================
// SECTION: Token Claims
// ============================================================================

/// Claims payload for minted tokens.
#[derive(Debug, Clone, Serialize)]
pub struct TokenClaims {
    /// Agent identity bound to the token.
    pub agent_id: String,
    /// Scopes granted to the caller.
    pub scopes: Vec<String>,
    /// Caller tier.
    pub tier: Tier,
    /// Expiry as seconds since the unix epoch.
    pub exp: i64,
    /// Opaque policy version tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_version: Option<String>,
}

// ============================================================================
// SECTION: Secret Resolution
// ============================================================================

/// Resolves the signing secret, env var first, then the file fallback.
///
/// # Errors
///
/// Returns [`AuthConfigError::MissingSecret`] when neither source yields a
/// non-empty secret.
pub fn resolve_secret(deployment_root: &Path) -> Result<String, AuthConfigError> {
    if let Ok(secret) = env::var(JWT_SECRET_ENV) {
        let trimmed = secret.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
    let fallback = deployment_root.join(JWT_SECRET_FILE);
    if let Ok(contents) = fs::read_to_string(&fallback) {
        let trimmed = contents.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
    Err(AuthConfigError::MissingSecret)
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Verifies bearer credentials and binds them to the transport identity.
pub struct TokenVerifier {
    /// Symmetric signing secret.
    secret: Vec<u8>,
    /// Time source for expiry checks.
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    /// Creates a verifier with an explicit secret.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.into(),
            clock,
        }
    }

    /// Creates a verifier with the secret resolved from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`AuthConfigError::MissingSecret`] when no secret is configured.
    pub fn from_env(
        deployment_root: &Path,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthConfigError> {
        let secret = resolve_secret(deployment_root)?;
        Ok(Self::new(secret.into_bytes(), clock))
    }

    /// Verifies the credential and returns the caller's claims.
    ///
    /// # Errors
    ///
    /// Returns the specific [`AuthError`] for the first check that fails.
    pub fn verify(
        &self,
        agent_header: Option<&str>,
        auth_header: Option<&str>,
    ) -> Result<AuthClaims, AuthError> {
        let agent_header = agent_header.map(str::trim).filter(|value| !value.is_empty());
        let Some(agent_header) = agent_header else {
            return Err(AuthError::MissingHeader);
        };

        let token = parse_bearer_token(auth_header)?;
        let claims = self.verify_signature(token)?;

        let agent_id = claims
            .get("agent_id")
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AuthError::InvalidToken("agent_id claim missing".to_string()))?;

        let scopes_value = claims
            .get("scopes")
            .ok_or_else(|| AuthError::InvalidToken("scopes claim missing".to_string()))?;
        let scopes_list = scopes_value
            .as_array()
            .ok_or_else(|| AuthError::InvalidToken("scopes claim must be an array".to_string()))?;
        let mut scopes = std::collections::BTreeSet::new();
        for scope in scopes_list {
            let scope = scope.as_str().ok_or_else(|| {
                AuthError::InvalidToken("scopes claim must be an array of strings".to_string())
            })?;
            scopes.insert(scope.to_string());
        }

        let tier_value = claims
            .get("tier")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::InvalidToken("tier claim missing".to_string()))?;
        let tier = Tier::parse(tier_value)
            .ok_or_else(|| AuthError::InvalidToken(format!("unknown tier: {tier_value}")))?;

        let exp = claims
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or_else(|| AuthError::InvalidToken("exp claim missing".to_string()))?;
        if self.clock.unix_seconds() >= exp {
            return Err(AuthError::Expired);
        }

        if agent_id != agent_header {
            return Err(AuthError::AgentMismatch);
        }

        let policy_version =
            claims.get("policy_version").and_then(Value::as_str).map(str::to_string);

        Ok(AuthClaims {
            agent_id: AgentId::new(agent_id),
            scopes,
            tier,
            policy_version,
        })
    }

    /// Checks the token's structure and HMAC tag, returning the raw claims.
    fn verify_signature(&self, token: &str) -> Result<Value, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(tag_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::InvalidToken("malformed token".to_string()));
        };

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| AuthError::InvalidToken("malformed token header".to_string()))?;
        let header: Value = serde_json::from_slice(&header_bytes)
            .map_err(|_| AuthError::InvalidToken("malformed token header".to_string()))?;
        if header.get("alg").and_then(Value::as_str) != Some("HS256") {
            return Err(AuthError::InvalidToken("unsupported algorithm".to_string()));
        }

        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|_| AuthError::InvalidToken("malformed token signature".to_string()))?;
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AuthError::InvalidToken("signature check failed".to_string()))?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        // Constant-time tag comparison.
        mac.verify_slice(&tag)
            .map_err(|_| AuthError::InvalidToken("signature mismatch".to_string()))?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::InvalidToken("malformed token payload".to_string()))?;
        serde_json::from_slice(&payload_bytes)
            .map_err(|_| AuthError::InvalidToken("malformed token payload".to_string()))
    }
}

// ============================================================================
// SECTION: Signing
// ============================================================================

/// Mints a compact HS256 token for the given claims.
///
/// Serves the CLI `token` subcommand and tests; the gateway itself never
/// issues credentials.
///
/// # Errors
///
/// Returns [`SignError`] when serialization or keying fails.
pub fn sign_token(secret: &[u8], claims: &TokenClaims) -> Result<String, SignError> {
    let header_b64 = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload =
        serde_json::to_vec(claims).map_err(|error| SignError(error.to_string()))?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|error| SignError(error.to_string()))?;
    mac.update(signing_input.as_bytes());
    let tag_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{signing_input}.{tag_b64}"))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the bearer credential from the authorization header value.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<&str, AuthError> {
    let header = auth_header.ok_or(AuthError::MissingToken)?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::MissingToken);
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
