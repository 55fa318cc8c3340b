// crates/hypepipe-caps/src/lib.rs
// ============================================================================
// Module: HypePipe Capabilities
// Description: Capability handlers and the static dispatch registry.
// Purpose: Compute snapshot-derived views behind the gateway's handler seam.
// Dependencies: hypepipe-core, serde_json
// ============================================================================

//! ## Overview
//! This crate implements the capability handlers exposed through the HypePipe
//! dispatch endpoint and the static registry mapping capability names to
//! handlers and cache TTLs. Handlers consume only the
//! [`hypepipe_core::SnapshotReader`] seam and degrade to stub payloads when
//! upstream data is unavailable.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod asset;
pub mod extract;
pub mod pillars;
pub mod regime;
pub mod registry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use asset::AssetSnapshotHandler;
pub use pillars::MacroPillarsHandler;
pub use regime::MacroRegimeHandler;
pub use registry::ASSET_SNAPSHOT_TTL_SECS;
pub use registry::CapabilityHandler;
pub use registry::CapabilityRegistration;
pub use registry::CapabilityRegistry;
pub use registry::MACRO_PILLARS_TTL_SECS;
pub use registry::MACRO_REGIME_TTL_SECS;
