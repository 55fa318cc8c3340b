// crates/hypepipe-gateway/src/config.rs
// ============================================================================
// Module: Gateway Configuration
// Description: Runtime configuration for the HypePipe gateway process.
// Purpose: Resolve bind address, store paths, and operational flags.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Gateway configuration comes from flags and environment variables: the
//! signing secret (see [`crate::auth`]), the cache kill switch, and the
//! database location. The per-capability TTL table is static in code by
//! design and is not externally configurable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::path::PathBuf;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable engaging the cache kill switch.
pub const CACHE_DISABLED_ENV: &str = "HYPEPIPE_CACHE_DISABLED";
/// Default HTTP bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";
/// Default database file, relative to the deployment root.
pub const DEFAULT_DB_FILE: &str = "hypepipe.db";

// ============================================================================
// SECTION: Config
// ============================================================================

/// Runtime configuration for the gateway process.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP bind address.
    pub bind: String,
    /// Deployment root; anchors the secret-file fallback.
    pub deployment_root: PathBuf,
    /// Database file holding the audit and snapshot tables.
    pub db_path: PathBuf,
    /// Cache kill switch state.
    pub cache_disabled: bool,
}

impl GatewayConfig {
    /// Builds the default configuration with flags read from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            cache_disabled: cache_disabled_from_env(),
            ..Self::default()
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            deployment_root: PathBuf::from("."),
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            cache_disabled: false,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true for recognized truthy flag values.
#[must_use]
pub fn truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Reads the cache kill switch from the environment.
#[must_use]
pub fn cache_disabled_from_env() -> bool {
    env::var(CACHE_DISABLED_ENV).is_ok_and(|value| truthy(&value))
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

    use super::GatewayConfig;
    use super::truthy;

    #[test]
    fn truthy_accepts_common_flag_spellings() {
        for value in ["1", "true", "TRUE", "yes", "on", " On "] {
            assert!(truthy(value), "{value} should be truthy");
        }
        for value in ["", "0", "false", "off", "no", "2"] {
            assert!(!truthy(value), "{value} should be falsy");
        }
    }

    #[test]
    fn defaults_bind_loopback_with_cache_enabled() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind, "127.0.0.1:8787");
        assert!(!config.cache_disabled);
    }
}
