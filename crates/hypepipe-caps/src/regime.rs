// crates/hypepipe-caps/src/regime.rs
// ============================================================================
// Module: Macro Regime Capability
// Description: Handler for the macro.regime capability.
// Purpose: Classify the current market regime into explainable buckets.
// Dependencies: hypepipe-core, serde_json
// ============================================================================

//! ## Overview
//! Heuristic regime classifier over live BTC snapshots. The output is an
//! interpretive label plus four axes and up to three drivers — buckets only,
//! no formulas disclosed. Every axis degrades independently when its source
//! snapshot is missing.

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

use crate::extract::Liquidations;
use crate::extract::MISSING;
use crate::extract::OpenInterest;
use crate::extract::bucket;
use crate::extract::extract_funding;
use crate::extract::extract_liquidations;
use crate::extract::extract_oi;
use crate::extract::extract_price;
use crate::extract::fmt_pct;
use crate::extract::fmt_pct_unsigned;
use crate::extract::fmt_usd;
use crate::extract::read_fear_greed;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler for `macro.regime`.
pub struct MacroRegimeHandler {
    /// Snapshot store access.
    reader: Arc<dyn SnapshotReader>,
    /// Time source for synthesized freshness markers.
    clock: Arc<dyn Clock>,
}

impl MacroRegimeHandler {
    /// Creates the handler over the given collaborators.
    #[must_use]
    pub fn new(reader: Arc<dyn SnapshotReader>, clock: Arc<dyn Clock>) -> Self {
        Self {
            reader,
            clock,
        }
    }
}

impl crate::registry::CapabilityHandler for MacroRegimeHandler {
    fn invoke(&self, _input: &Map<String, Value>) -> HandlerOutcome {
        let price_snap = self.reader.get_snapshot("coingecko:price_simple:usd:bitcoin");
        let oi_snap = self.reader.get_snapshot("coinglass:open_interest:BTC");
        let funding_snap = self.reader.get_snapshot("coinglass:oi_weighted_funding:BTC");
        let liq_snap = self.reader.get_snapshot("coinglass:liquidations:BTC");
        let snapshots_seen =
            [&price_snap, &oi_snap, &funding_snap, &liq_snap].iter().any(|snap| snap.is_some());

        let mut parts_ok = 0u32;

        let (price, chg24) =
            price_snap.as_ref().map_or((None, None), |snap| extract_price(&snap.payload));
        if chg24.is_some() {
            parts_ok += 1;
        }

        let funding_pct = funding_snap.as_ref().and_then(|snap| extract_funding(&snap.payload));
        if funding_pct.is_some() {
            parts_ok += 1;
        }

        let oi = oi_snap
            .as_ref()
            .map_or_else(OpenInterest::default, |snap| extract_oi(&snap.payload));
        if oi.oi_change_24h.is_some() {
            parts_ok += 1;
        }

        let liq = liq_snap
            .as_ref()
            .map_or_else(Liquidations::default, |snap| extract_liquidations(&snap.payload));
        if liq.total_usd.is_some() {
            parts_ok += 1;
        }

        let fg = read_fear_greed(self.reader.as_ref()).value;

        // Trend axis: 24h price change.
        let (trend_label, trend_bkt) = match chg24 {
            None => (MISSING, "flat"),
            Some(change) if change >= 1.0 => ("Up", "up"),
            Some(change) if change <= -1.0 => ("Down", "down"),
            Some(_) => ("Flat", "flat"),
        };

        // Volatility axis: liquidation total as a shockiness proxy.
        let vol_bkt =
            bucket(liq.total_usd, 25_000_000.0, 120_000_000.0, ("calm", "chop", "shock"));
        let vol_label = match vol_bkt {
            "calm" => "Calm",
            "shock" => "Shock",
            _ => "Chop",
        };

        // Leverage axis: funding as a crowding hint.
        let lev_bkt = bucket(funding_pct, -0.02, 0.10, ("low", "neutral", "high"));
        let lev_label = match lev_bkt {
            "low" => "Light",
            "high" => "Crowded",
            _ => "Normal",
        };

        // Liquidity axis: liquidation skew as a fragility proxy.
        let liq_bkt = match liq.long_pct {
            Some(long_pct) if long_pct >= 70.0 => "tight",
            Some(long_pct) if long_pct <= 40.0 => "loose",
            _ => "normal",
        };
        let liq_label = match liq_bkt {
            "loose" => "Loose",
            "tight" => "Tight",
            _ => "Normal",
        };

        let label = regime_label(trend_bkt, vol_bkt, lev_bkt, liq_bkt, fg);
        let confidence = confidence(parts_ok);

        let mut drivers: Vec<String> = Vec::new();
        if let (Some(price), Some(chg24)) = (price, chg24) {
            drivers.push(format!(
                "BTC {} \u{2022} {} 24h (trend axis)",
                fmt_usd(Some(price)),
                fmt_pct(Some(chg24), 2)
            ));
        }
        if funding_pct.is_some() {
            drivers.push(format!("Funding {} (crowding proxy)", fmt_pct(funding_pct, 3)));
        }
        if liq.total_usd.is_some() && liq.long_pct.is_some() {
            drivers.push(format!(
                "Liqs {} \u{2022} {} long (fragility proxy)",
                fmt_usd(liq.total_usd),
                fmt_pct_unsigned(liq.long_pct, 0)
            ));
        }
        if let Some(fg) = fg {
            drivers.push(format!("Fear & Greed {fg} (sentiment context)"));
        }
        while drivers.len() < 3 {
            drivers.push(MISSING.to_string());
        }
        drivers.truncate(3);

        let asof = price_snap
            .and_then(|snap| snap.updated_at)
            .unwrap_or_else(|| self.clock.now_rfc3339());

        let payload = json!({
            "version": "v0.2-live",
            "regime": {"label": label, "confidence": confidence, "since": null},
            "axes": [
                {"key": "trend", "label": "Trend", "value": trend_label},
                {"key": "volatility", "label": "Volatility", "value": vol_label},
                {"key": "leverage", "label": "Leverage", "value": lev_label},
                {"key": "liquidity", "label": "Liquidity", "value": liq_label},
            ],
            "drivers": drivers,
            "disclaimer": "Heuristic regime classifier derived from live snapshots. \
                           Outputs are buckets and drivers (no model disclosure).",
            "asof": asof,
        });

        if snapshots_seen {
            HandlerOutcome::Ok {
                payload,
                asof,
            }
        } else {
            HandlerOutcome::Degraded {
                payload,
                asof,
                note: "missing_snapshots".to_string(),
            }
        }
    }
}

// ============================================================================
// SECTION: Classification Helpers
// ============================================================================

/// Coarse regime mapping over axis buckets.
fn regime_label(
    trend_bkt: &str,
    vol_bkt: &str,
    lev_bkt: &str,
    liq_bkt: &str,
    fg: Option<i64>,
) -> &'static str {
    let extreme_fear = fg.is_some_and(|value| value <= 25);
    // Risk-Off: negative trend plus high leverage/fragility or extreme fear.
    if trend_bkt == "down" && (lev_bkt == "high" || liq_bkt == "tight" || extreme_fear) {
        return "Risk-Off";
    }
    // Trend: strong directional move with non-choppy volatility.
    if (trend_bkt == "up" || trend_bkt == "down") && vol_bkt != "chop" {
        return "Trend";
    }
    // Risk-On: up trend, leverage not crowded, sentiment not extreme fear.
    if trend_bkt == "up" && lev_bkt != "high" && !extreme_fear {
        return "Risk-On";
    }
    "Chop"
}

/// Confidence label from the number of populated signal parts.
const fn confidence(parts_ok: u32) -> &'static str {
    if parts_ok >= 4 {
        "high"
    } else if parts_ok >= 2 {
        "medium"
    } else {
        "low"
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
    use serde_json::Value;
    use serde_json::json;

    use super::MacroRegimeHandler;
    use super::regime_label;
    use crate::registry::CapabilityHandler;

    /// Stores a snapshot without a fetch timestamp.
    fn insert(reader: &InMemorySnapshotReader, key: &str, payload: Value) {
        reader.insert(
            key,
            Snapshot {
                payload,
                updated_at: Some("2023-11-14T22:00:00Z".to_string()),
            },
        );
    }

    /// Builds a handler over the given reader with a fixed clock.
    fn handler(reader: Arc<InMemorySnapshotReader>) -> MacroRegimeHandler {
        let clock = Arc::new(ManualClock::new(1_700_000_000, "2023-11-14T22:13:20Z"));
        MacroRegimeHandler::new(reader, clock)
    }

    #[test]
    fn risk_off_requires_down_trend_with_stress() {
        assert_eq!(regime_label("down", "shock", "high", "normal", None), "Risk-Off");
        assert_eq!(regime_label("down", "shock", "neutral", "tight", None), "Risk-Off");
        assert_eq!(regime_label("down", "shock", "neutral", "normal", Some(20)), "Risk-Off");
        assert_eq!(regime_label("down", "calm", "neutral", "normal", Some(50)), "Trend");
    }

    #[test]
    fn up_trend_in_chop_without_stress_is_risk_on() {
        assert_eq!(regime_label("up", "chop", "neutral", "normal", Some(50)), "Risk-On");
        assert_eq!(regime_label("up", "chop", "high", "normal", Some(50)), "Chop");
    }

    #[test]
    fn full_snapshot_set_yields_high_confidence() {
        let reader = Arc::new(InMemorySnapshotReader::new());
        insert(
            &reader,
            "coingecko:price_simple:usd:bitcoin",
            json!({"data": {"price": 68_819, "change_24h": 2.4}}),
        );
        insert(
            &reader,
            "coinglass:open_interest:BTC",
            json!({"data": {"oi_usd": 43_800_000_000.0, "oi_change_24h": 1.2}}),
        );
        insert(
            &reader,
            "coinglass:oi_weighted_funding:BTC",
            json!({"data": {"rate": 0.000_5}}),
        );
        insert(
            &reader,
            "coinglass:liquidations:BTC",
            json!({"raw": [{"exchange": "All", "liquidation_usd": 10_000_000.0,
                "longLiquidation_usd": 5_000_000.0, "shortLiquidation_usd": 5_000_000.0}]}),
        );
        let outcome = handler(reader).invoke(&Map::new());
        let (payload, asof) = outcome.into_success().unwrap();
        assert_eq!(payload["regime"]["confidence"], json!("high"));
        assert_eq!(payload["regime"]["label"], json!("Trend"));
        assert_eq!(payload["axes"][0]["value"], json!("Up"));
        assert_eq!(payload["drivers"].as_array().unwrap().len(), 3);
        assert_eq!(asof, "2023-11-14T22:00:00Z");
    }

    #[test]
    fn empty_store_degrades_with_low_confidence() {
        let reader = Arc::new(InMemorySnapshotReader::new());
        let outcome = handler(reader).invoke(&Map::new());
        assert!(!outcome.is_fault());
        let (payload, asof) = outcome.into_success().unwrap();
        assert_eq!(payload["regime"]["confidence"], json!("low"));
        assert_eq!(payload["regime"]["label"], json!("Chop"));
        // Every driver pads to the missing marker.
        assert_eq!(payload["drivers"][0], json!("\u{2014}"));
        assert_eq!(asof, "2023-11-14T22:13:20Z");
    }
}
