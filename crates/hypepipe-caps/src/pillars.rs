// crates/hypepipe-caps/src/pillars.rs
// ============================================================================
// Module: Macro Pillars Capability
// Description: Handler for the macro.pillars capability.
// Purpose: Build the six-pillar market scorecard for one symbol.
// Dependencies: hypepipe-core, serde_json
// ============================================================================

//! ## Overview
//! Builds the pillar scorecard (flow, leverage, fragility, momentum,
//! sentiment, risk) from the same snapshots the dashboard consumes. Every
//! pillar degrades independently to the missing marker when its source
//! snapshot is absent. Values are intentionally high-level interpretation
//! labels; no methodology is disclosed.

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

use crate::extract::GlobalStats;
use crate::extract::Liquidations;
use crate::extract::MISSING;
use crate::extract::OpenInterest;
use crate::extract::bucket;
use crate::extract::extract_funding;
use crate::extract::extract_global;
use crate::extract::extract_liquidations;
use crate::extract::extract_oi;
use crate::extract::extract_price;
use crate::extract::fmt_pct;
use crate::extract::fmt_usd;
use crate::extract::read_fear_greed;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler for `macro.pillars`.
pub struct MacroPillarsHandler {
    /// Snapshot store access.
    reader: Arc<dyn SnapshotReader>,
    /// Time source for synthesized freshness markers.
    clock: Arc<dyn Clock>,
}

impl MacroPillarsHandler {
    /// Creates the handler over the given collaborators.
    #[must_use]
    pub fn new(reader: Arc<dyn SnapshotReader>, clock: Arc<dyn Clock>) -> Self {
        Self {
            reader,
            clock,
        }
    }
}

/// Builds one pillar card object.
fn pillar(key: &str, label: &str, value: String, status: &str, hint: &str) -> Value {
    json!({"key": key, "label": label, "value": value, "status": status, "hint": hint})
}

/// Maps a bucket onto a pillar status label.
fn status(bucket: &str) -> &'static str {
    match bucket {
        "high" => "positive",
        "low" => "negative",
        _ => "neutral",
    }
}

/// Confidence label from the number of populated pillars.
const fn confidence(parts_ok: u32) -> &'static str {
    if parts_ok >= 5 {
        "high"
    } else if parts_ok >= 3 {
        "medium"
    } else {
        "low"
    }
}

/// Coarse stance label over the strongest signals.
fn stance(
    chg24: Option<f64>,
    fg_value: Option<i64>,
    funding_pct: Option<f64>,
    liq_long_pct: Option<f64>,
) -> &'static str {
    if fg_value.is_some_and(|value| value <= 25) && chg24.is_some_and(|change| change < 0.0) {
        return "cautious";
    }
    if funding_pct.is_some_and(|funding| funding >= 0.10)
        && liq_long_pct.is_some_and(|long_pct| long_pct >= 70.0)
    {
        return "crowded-longs";
    }
    if chg24.is_some_and(|change| change > 1.0) {
        return "risk-on";
    }
    "neutral"
}

impl crate::registry::CapabilityHandler for MacroPillarsHandler {
    fn invoke(&self, input: &Map<String, Value>) -> HandlerOutcome {
        let requested =
            input.get("symbol").and_then(Value::as_str).unwrap_or("BTC").to_ascii_uppercase();
        let sym = if requested == "ETH" { "ETH" } else { "BTC" };
        let cg_id = if sym == "ETH" { "ethereum" } else { "bitcoin" };

        let price_snap = self.reader.get_snapshot(&format!("coingecko:price_simple:usd:{cg_id}"));
        let funding_snap = self.reader.get_snapshot(&format!("coinglass:oi_weighted_funding:{sym}"));
        let oi_snap = self.reader.get_snapshot(&format!("coinglass:open_interest:{sym}"));
        let liq_snap = self.reader.get_snapshot(&format!("coinglass:liquidations:{sym}"));
        let global_snap = self.reader.get_snapshot("coingecko:global");
        let snapshots_seen = [&price_snap, &funding_snap, &oi_snap, &liq_snap, &global_snap]
            .iter()
            .any(|snap| snap.is_some());

        let (price, chg24) =
            price_snap.as_ref().map_or((None, None), |snap| extract_price(&snap.payload));
        let funding_pct = funding_snap.as_ref().and_then(|snap| extract_funding(&snap.payload));
        let oi = oi_snap
            .as_ref()
            .map_or_else(OpenInterest::default, |snap| extract_oi(&snap.payload));
        let liq = liq_snap
            .as_ref()
            .map_or_else(Liquidations::default, |snap| extract_liquidations(&snap.payload));
        let global = global_snap
            .as_ref()
            .map_or_else(GlobalStats::default, |snap| extract_global(&snap.payload));
        let fear_greed = read_fear_greed(self.reader.as_ref());

        let mut parts_ok = 0u32;

        // Flow: liquidation intensity plus global volume as market pressure.
        let flow_bkt = bucket(liq.total_usd, 25_000_000.0, 120_000_000.0, ("low", "neutral", "high"));
        let has_flow = liq.total_usd.is_some() || global.total_vol_usd.is_some();
        let flow_value = if has_flow {
            format!("{} liqs / {} vol", fmt_usd(liq.total_usd), fmt_usd(global.total_vol_usd))
        } else {
            MISSING.to_string()
        };
        if has_flow {
            parts_ok += 1;
        }
        let flow = pillar("flow", "Flow", flow_value, status(flow_bkt), "pressure proxy (liqs/volume)");

        // Leverage: open interest plus funding.
        let lev_bkt = bucket(funding_pct, -0.02, 0.10, ("low", "neutral", "high"));
        let has_lev = oi.oi_usd.is_some() || funding_pct.is_some();
        let lev_value = if has_lev {
            format!("{} OI \u{2022} {} funding", fmt_usd(oi.oi_usd), fmt_pct(funding_pct, 3))
        } else {
            MISSING.to_string()
        };
        if has_lev {
            parts_ok += 1;
        }
        let leverage = pillar("leverage", "Leverage", lev_value, status(lev_bkt), "OI + funding stress");

        // Fragility: liquidation skew.
        let frag_bkt = bucket(liq.long_pct, 40.0, 70.0, ("low", "neutral", "high"));
        let has_frag = liq.long_pct.is_some() && liq.short_pct.is_some();
        let frag_value = if has_frag {
            format!("{} long / {} short", fmt_pct(liq.long_pct, 0), fmt_pct(liq.short_pct, 0))
        } else {
            MISSING.to_string()
        };
        if has_frag {
            parts_ok += 1;
        }
        let fragility =
            pillar("fragility", "Fragility", frag_value, status(frag_bkt), "liq imbalance + spikes");

        // Momentum: price plus 24h change.
        let mom_bkt = bucket(chg24, -1.0, 1.0, ("low", "neutral", "high"));
        let has_mom = price.is_some() || chg24.is_some();
        let mom_value = if has_mom {
            format!("{} \u{2022} {} 24h", fmt_usd(price), fmt_pct(chg24, 2))
        } else {
            MISSING.to_string()
        };
        if has_mom {
            parts_ok += 1;
        }
        let momentum = pillar("momentum", "Momentum", mom_value, status(mom_bkt), "trend + volatility");

        // Sentiment: fear/greed index.
        let sent_bkt = match fear_greed.value {
            Some(value) if value <= 25 => "low",
            Some(value) if value >= 60 => "high",
            Some(_) => "neutral",
            None => "neutral",
        };
        let sent_value = match (fear_greed.value, fear_greed.label.as_deref()) {
            (Some(value), Some(label)) => format!("{value} \u{2014} {label}"),
            (Some(value), None) => value.to_string(),
            (None, _) => MISSING.to_string(),
        };
        if fear_greed.value.is_some() {
            parts_ok += 1;
        }
        let sentiment = pillar("sentiment", "Sentiment", sent_value, status(sent_bkt), "fear/greed index");

        // Risk: open interest change plus BTC dominance.
        let risk_bkt = bucket(oi.oi_change_24h, -2.0, 2.0, ("low", "neutral", "high"));
        let has_risk = oi.oi_change_24h.is_some() || global.btc_dominance.is_some();
        let risk_value = if has_risk {
            format!(
                "OI {} \u{2022} BTC dom {}",
                fmt_pct(oi.oi_change_24h, 2),
                fmt_pct(global.btc_dominance, 1)
            )
        } else {
            MISSING.to_string()
        };
        if has_risk {
            parts_ok += 1;
        }
        let risk = pillar("risk", "Risk", risk_value, status(risk_bkt), "regime + confidence");

        let stance_label = stance(chg24, fear_greed.value, funding_pct, liq.long_pct);
        let conf = confidence(parts_ok);

        let mut notes: Vec<String> = Vec::new();
        if funding_pct.is_some() {
            notes.push("Funding reflects positioning pressure (crowding proxy).".to_string());
        }
        if liq.total_usd.is_some() {
            notes.push("Liquidations help gauge fragility and forced flow.".to_string());
        }
        if fear_greed.value.is_some() {
            notes.push("Sentiment adds a behavioral context layer.".to_string());
        }
        while notes.len() < 3 {
            notes.push(MISSING.to_string());
        }
        notes.truncate(3);

        let asof = price_snap
            .and_then(|snap| snap.updated_at)
            .unwrap_or_else(|| self.clock.now_rfc3339());

        let payload = json!({
            "symbol": sym,
            "version": "v0.2-live",
            "summary": {
                "headline": format!("{sym} SuperCard"),
                "stance": stance_label,
                "confidence": conf,
                "notes": notes,
            },
            "pillars": [flow, leverage, fragility, momentum, sentiment, risk],
            "disclaimer": "Interpretation signals derived from live snapshots. \
                           Values are intentionally high-level (no methodology disclosed).",
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

    use super::MacroPillarsHandler;
    use super::stance;
    use crate::registry::CapabilityHandler;

    /// Stores a snapshot with a fixed fetch timestamp.
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
    fn handler(reader: Arc<InMemorySnapshotReader>) -> MacroPillarsHandler {
        let clock = Arc::new(ManualClock::new(1_700_000_000, "2023-11-14T22:13:20Z"));
        MacroPillarsHandler::new(reader, clock)
    }

    #[test]
    fn stance_prioritizes_fearful_downtrends() {
        assert_eq!(stance(Some(-2.0), Some(20), None, None), "cautious");
        assert_eq!(stance(Some(2.0), Some(20), Some(0.2), Some(80.0)), "crowded-longs");
        assert_eq!(stance(Some(2.0), Some(50), None, None), "risk-on");
        assert_eq!(stance(Some(0.5), Some(50), None, None), "neutral");
        assert_eq!(stance(None, None, None, None), "neutral");
    }

    #[test]
    fn unknown_symbol_falls_back_to_btc() {
        let reader = Arc::new(InMemorySnapshotReader::new());
        let mut input = Map::new();
        input.insert("symbol".to_string(), json!("SOL"));
        let outcome = handler(reader).invoke(&input);
        let (payload, _) = outcome.into_success().unwrap();
        assert_eq!(payload["symbol"], json!("BTC"));
        assert_eq!(payload["summary"]["headline"], json!("BTC SuperCard"));
    }

    #[test]
    fn full_snapshot_set_populates_all_pillars() {
        let reader = Arc::new(InMemorySnapshotReader::new());
        insert(
            &reader,
            "coingecko:price_simple:usd:bitcoin",
            json!({"data": {"price": 68_819, "change_24h": 2.4}}),
        );
        insert(
            &reader,
            "coinglass:oi_weighted_funding:BTC",
            json!({"data": {"rate": 0.001_178}}),
        );
        insert(
            &reader,
            "coinglass:open_interest:BTC",
            json!({"data": {"oi_usd": 43_800_000_000.0, "oi_change_24h": -1.91}}),
        );
        insert(
            &reader,
            "coinglass:liquidations:BTC",
            json!({"raw": [{"exchange": "All", "liquidation_usd": 63_000_000.0,
                "longLiquidation_usd": 51_000_000.0, "shortLiquidation_usd": 11_000_000.0}]}),
        );
        insert(
            &reader,
            "coingecko:global",
            json!({"data": {"btc_dominance": 56.7, "total_volume_usd": 103_000_000_000.0}}),
        );
        reader.insert(
            "altme:fear_greed",
            Snapshot {
                payload: json!({"data": [{"value": "72", "value_classification": "Greed"}]}),
                updated_at: None,
            },
        );

        let outcome = handler(reader).invoke(&Map::new());
        let (payload, asof) = outcome.into_success().unwrap();
        assert_eq!(payload["summary"]["confidence"], json!("high"));
        // Funding at 0.118% with an 81% long skew reads as crowded longs.
        assert_eq!(payload["summary"]["stance"], json!("crowded-longs"));
        let pillars = payload["pillars"].as_array().unwrap();
        assert_eq!(pillars.len(), 6);
        assert_eq!(pillars[4]["value"], json!("72 \u{2014} Greed"));
        assert_eq!(pillars[4]["status"], json!("positive"));
        assert_eq!(asof, "2023-11-14T22:00:00Z");
    }

    #[test]
    fn empty_store_degrades_every_pillar() {
        let reader = Arc::new(InMemorySnapshotReader::new());
        let outcome = handler(reader).invoke(&Map::new());
        assert!(!outcome.is_fault());
        let (payload, _) = outcome.into_success().unwrap();
        assert_eq!(payload["summary"]["confidence"], json!("low"));
        for card in payload["pillars"].as_array().unwrap() {
            assert_eq!(card["value"], json!("\u{2014}"));
            assert_eq!(card["status"], json!("neutral"));
        }
    }
}
