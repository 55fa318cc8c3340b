// crates/hypepipe-caps/src/asset.rs
// ============================================================================
// Module: Asset Snapshot Capability
// Description: Handler for the core.asset.snapshot capability.
// Purpose: Surface spot price and 24h change for a single asset.
// Dependencies: hypepipe-core, serde_json
// ============================================================================

//! ## Overview
//! Reads the simple-price snapshot for the requested asset and returns price,
//! 24h change, and the snapshot's freshness. Unknown assets and missing
//! snapshots degrade to a stub payload with a synthesized `asof`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use hypepipe_core::Clock;
use hypepipe_core::HandlerOutcome;
use hypepipe_core::SnapshotReader;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::extract::extract_price;
use crate::registry::CapabilityHandler;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler for `core.asset.snapshot`.
pub struct AssetSnapshotHandler {
    /// Snapshot store access.
    reader: Arc<dyn SnapshotReader>,
    /// Time source for synthesized freshness markers.
    clock: Arc<dyn Clock>,
}

impl AssetSnapshotHandler {
    /// Creates the handler over the given collaborators.
    #[must_use]
    pub fn new(reader: Arc<dyn SnapshotReader>, clock: Arc<dyn Clock>) -> Self {
        Self {
            reader,
            clock,
        }
    }
}

/// Maps an asset symbol onto its price dataset identifier.
fn dataset_id(asset: &str) -> Option<&'static str> {
    match asset {
        "BTC" => Some("bitcoin"),
        "ETH" => Some("ethereum"),
        _ => None,
    }
}

impl CapabilityHandler for AssetSnapshotHandler {
    fn invoke(&self, input: &Map<String, Value>) -> HandlerOutcome {
        let asset = input
            .get("asset")
            .and_then(Value::as_str)
            .unwrap_or("BTC")
            .to_ascii_uppercase();

        if let Some(id) = dataset_id(&asset)
            && let Some(snapshot) =
                self.reader.get_snapshot(&format!("coingecko:price_simple:usd:{id}"))
        {
            let (price, change_24h) = extract_price(&snapshot.payload);
            let asof = snapshot.updated_at.unwrap_or_else(|| self.clock.now_rfc3339());
            return HandlerOutcome::Ok {
                payload: json!({
                    "asset": asset,
                    "price": price,
                    "change_24h": change_24h,
                    "asof": asof,
                }),
                asof,
            };
        }

        let asof = self.clock.now_rfc3339();
        HandlerOutcome::Degraded {
            payload: json!({"asset": asset, "note": "stub", "asof": asof}),
            asof,
            note: "missing_snapshot".to_string(),
        }
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

    use hypepipe_core::InMemorySnapshotReader;
    use hypepipe_core::ManualClock;
    use hypepipe_core::Snapshot;
    use serde_json::Map;
    use serde_json::json;

    use super::AssetSnapshotHandler;
    use crate::registry::CapabilityHandler;

    /// Builds a handler over an in-memory store and a fixed clock.
    fn handler(reader: Arc<InMemorySnapshotReader>) -> AssetSnapshotHandler {
        let clock = Arc::new(ManualClock::new(1_700_000_000, "2023-11-14T22:13:20Z"));
        AssetSnapshotHandler::new(reader, clock)
    }

    #[test]
    fn returns_price_from_stored_snapshot() {
        let reader = Arc::new(InMemorySnapshotReader::new());
        reader.insert(
            "coingecko:price_simple:usd:bitcoin",
            Snapshot {
                payload: json!({"data": {"price": 68_819, "change_24h": -2.06}}),
                updated_at: Some("2023-11-14T22:00:00Z".to_string()),
            },
        );
        let outcome = handler(reader).invoke(&Map::new());
        let (payload, asof) = outcome.into_success().unwrap();
        assert_eq!(payload["asset"], json!("BTC"));
        assert_eq!(payload["price"], json!(68_819.0));
        assert_eq!(asof, "2023-11-14T22:00:00Z");
    }

    #[test]
    fn lowercase_input_symbol_is_normalized() {
        let reader = Arc::new(InMemorySnapshotReader::new());
        reader.insert(
            "coingecko:price_simple:usd:ethereum",
            Snapshot {
                payload: json!({"data": {"price": 3_500, "change_24h": 1.1}}),
                updated_at: None,
            },
        );
        let mut input = Map::new();
        input.insert("asset".to_string(), json!("eth"));
        let outcome = handler(reader).invoke(&input);
        let (payload, asof) = outcome.into_success().unwrap();
        assert_eq!(payload["asset"], json!("ETH"));
        // No stored fetch time: freshness falls back to the clock.
        assert_eq!(asof, "2023-11-14T22:13:20Z");
    }

    #[test]
    fn missing_snapshot_degrades_to_stub() {
        let reader = Arc::new(InMemorySnapshotReader::new());
        let outcome = handler(reader).invoke(&Map::new());
        let (payload, asof) = outcome.clone().into_success().unwrap();
        assert_eq!(payload["note"], json!("stub"));
        assert_eq!(asof, "2023-11-14T22:13:20Z");
        assert!(!outcome.is_fault());
    }

    #[test]
    fn unknown_asset_degrades_to_stub() {
        let reader = Arc::new(InMemorySnapshotReader::new());
        let mut input = Map::new();
        input.insert("asset".to_string(), json!("DOGE"));
        let outcome = handler(reader).invoke(&input);
        let (payload, _) = outcome.into_success().unwrap();
        assert_eq!(payload["asset"], json!("DOGE"));
        assert_eq!(payload["note"], json!("stub"));
    }
}
