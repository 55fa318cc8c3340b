// crates/hypepipe-caps/src/extract.rs
// ============================================================================
// Module: Snapshot Payload Extractors
// Description: Typed signal extraction from stored provider payloads.
// Purpose: Keep payload-shape knowledge in one place for all handlers.
// Dependencies: hypepipe-core, serde_json
// ============================================================================

//! ## Overview
//! Provider payloads are stored as raw JSON in the snapshot registry; their
//! shapes were fixed by upstream dataset discovery and are matched here
//! field-for-field. Extractors tolerate absent or malformed fields by
//! returning `None` — a missing signal is a degraded display, never an error.
//!
//! Formatting helpers render the compact display strings used in regime
//! drivers and pillar values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hypepipe_core::SnapshotReader;
use serde_json::Value;

// ============================================================================
// SECTION: Numeric Coercion
// ============================================================================

/// Coerces a JSON value into a float, accepting numeric strings.
#[must_use]
pub fn num(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Coerces an optional JSON value into a float.
fn num_opt(value: Option<&Value>) -> Option<f64> {
    value.and_then(num)
}

// ============================================================================
// SECTION: Formatting Helpers
// ============================================================================

/// Placeholder shown when a signal is unavailable.
pub const MISSING: &str = "\u{2014}";

/// Formats a USD amount with magnitude suffixes.
#[must_use]
pub fn fmt_usd(amount: Option<f64>) -> String {
    let Some(amount) = amount else {
        return MISSING.to_string();
    };
    let magnitude = amount.abs();
    if magnitude >= 1_000_000_000.0 {
        format!("${:.1}B", amount / 1_000_000_000.0)
    } else if magnitude >= 1_000_000.0 {
        format!("${:.1}M", amount / 1_000_000.0)
    } else if magnitude >= 1_000.0 {
        format!("${}", thousands(amount))
    } else {
        format!("${amount:.2}")
    }
}

/// Formats a signed percentage with the given precision.
#[must_use]
pub fn fmt_pct(pct: Option<f64>, digits: usize) -> String {
    let Some(pct) = pct else {
        return MISSING.to_string();
    };
    let sign = if pct > 0.0 { "+" } else { "" };
    format!("{sign}{pct:.digits$}%")
}

/// Formats a percentage without a leading sign.
#[must_use]
pub fn fmt_pct_unsigned(pct: Option<f64>, digits: usize) -> String {
    pct.map_or_else(|| MISSING.to_string(), |pct| format!("{pct:.digits$}%"))
}

/// Renders a rounded amount with comma thousands separators.
fn thousands(amount: f64) -> String {
    let digits = format!("{:.0}", amount.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0.0 {
        grouped.push('-');
    }
    for (index, ch) in digits.chars().enumerate() {
        if index != 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

// ============================================================================
// SECTION: Extractors
// ============================================================================

/// Extracts spot price and 24h change from `coingecko:price_simple:usd:{id}`.
///
/// Shape: `{"data": {"price": 68819, "change_24h": -2.06}, ...}`.
#[must_use]
pub fn extract_price(payload: &Value) -> (Option<f64>, Option<f64>) {
    let data = &payload["data"];
    (num_opt(data.get("price")), num_opt(data.get("change_24h")))
}

/// Global market signals from `coingecko:global`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalStats {
    /// BTC dominance percentage.
    pub btc_dominance: Option<f64>,
    /// ETH dominance percentage.
    pub eth_dominance: Option<f64>,
    /// Total market cap in USD.
    pub total_mcap_usd: Option<f64>,
    /// Total 24h volume in USD.
    pub total_vol_usd: Option<f64>,
    /// 24h market cap change percentage.
    pub mcap_change_24h: Option<f64>,
}

/// Extracts global market signals from `coingecko:global`.
///
/// Shape: `{"data": {"btc_dominance": 56.7, "eth_dominance": 9.8,
/// "total_volume_usd": ..., "total_market_cap_usd": ..., ...}}`.
#[must_use]
pub fn extract_global(payload: &Value) -> GlobalStats {
    let data = &payload["data"];
    GlobalStats {
        btc_dominance: num_opt(data.get("btc_dominance")),
        eth_dominance: num_opt(data.get("eth_dominance")),
        total_mcap_usd: num_opt(data.get("total_market_cap_usd")),
        total_vol_usd: num_opt(data.get("total_volume_usd")),
        mcap_change_24h: num_opt(data.get("market_cap_change_24h_pct")),
    }
}

/// Extracts the OI-weighted funding rate as a percentage.
///
/// Shape: `{"data": {"rate": 0.001178, "symbol": "BTC", ...}, ...}`.
/// The stored rate is a fraction; the returned value is `rate * 100`.
#[must_use]
pub fn extract_funding(payload: &Value) -> Option<f64> {
    num_opt(payload["data"].get("rate")).map(|rate| rate * 100.0)
}

/// Open interest signals from `coinglass:open_interest:{SYM}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenInterest {
    /// Open interest in USD.
    pub oi_usd: Option<f64>,
    /// 24h open interest change percentage.
    pub oi_change_24h: Option<f64>,
}

/// Extracts open interest signals from `coinglass:open_interest:{SYM}`.
#[must_use]
pub fn extract_oi(payload: &Value) -> OpenInterest {
    let data = &payload["data"];
    OpenInterest {
        oi_usd: num_opt(data.get("oi_usd")),
        oi_change_24h: num_opt(data.get("oi_change_24h")),
    }
}

/// Liquidation totals and skew from `coinglass:liquidations:{SYM}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Liquidations {
    /// Total liquidations in USD.
    pub total_usd: Option<f64>,
    /// Long liquidations in USD.
    pub long_usd: Option<f64>,
    /// Short liquidations in USD.
    pub short_usd: Option<f64>,
    /// Long share of total liquidations.
    pub long_pct: Option<f64>,
    /// Short share of total liquidations.
    pub short_pct: Option<f64>,
}

/// Extracts liquidation totals from `coinglass:liquidations:{SYM}`.
///
/// Shape: `{"raw": [{"exchange": "All", "liquidation_usd": ...,
/// "longLiquidation_usd": ..., "shortLiquidation_usd": ...}, ...]}`.
/// The `exchange = "All"` row carries the totals; the first row is the
/// fallback when no such row exists.
#[must_use]
pub fn extract_liquidations(payload: &Value) -> Liquidations {
    let rows = payload["raw"].as_array().map_or(&[][..], Vec::as_slice);
    let all_row = rows
        .iter()
        .find(|row| row.get("exchange").and_then(Value::as_str) == Some("All"))
        .or_else(|| rows.first());
    let Some(row) = all_row else {
        return Liquidations::default();
    };

    let total = num_opt(row.get("liquidation_usd"));
    let long_usd = num_opt(row.get("longLiquidation_usd"));
    let short_usd = num_opt(row.get("shortLiquidation_usd"));

    let share = |part: Option<f64>| match (part, total) {
        (Some(part), Some(total)) if total != 0.0 => Some(part / total * 100.0),
        _ => None,
    };

    Liquidations {
        total_usd: total,
        long_usd,
        short_usd,
        long_pct: share(long_usd),
        short_pct: share(short_usd),
    }
}

/// Current fear/greed reading from `altme:fear_greed`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FearGreed {
    /// Index value (0–100).
    pub value: Option<i64>,
    /// Upstream classification label.
    pub label: Option<String>,
}

/// Reads the current fear/greed value and label from the snapshot store.
#[must_use]
pub fn read_fear_greed(reader: &dyn SnapshotReader) -> FearGreed {
    let Some(snapshot) = reader.get_snapshot("altme:fear_greed") else {
        return FearGreed::default();
    };
    let Some(row) = snapshot.payload["data"].get(0) else {
        return FearGreed::default();
    };
    let value = match row.get("value") {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    };
    let label = row.get("value_classification").and_then(Value::as_str).map(str::to_string);
    FearGreed {
        value,
        label,
    }
}

// ============================================================================
// SECTION: Bucketing
// ============================================================================

/// Buckets a scalar into low/middle/high labels around two thresholds.
///
/// A missing value lands in the middle bucket.
#[must_use]
pub fn bucket(
    value: Option<f64>,
    lo: f64,
    hi: f64,
    labels: (&'static str, &'static str, &'static str),
) -> &'static str {
    let Some(value) = value else {
        return labels.1;
    };
    if value <= lo {
        labels.0
    } else if value >= hi {
        labels.2
    } else {
        labels.1
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

    use super::bucket;
    use super::extract_funding;
    use super::extract_global;
    use super::extract_liquidations;
    use super::extract_oi;
    use super::extract_price;
    use super::fmt_pct;
    use super::fmt_usd;
    use super::num;

    #[test]
    fn num_accepts_numbers_and_numeric_strings() {
        assert_eq!(num(&json!(68_819)), Some(68_819.0));
        assert_eq!(num(&json!("42.5")), Some(42.5));
        assert_eq!(num(&json!("n/a")), None);
        assert_eq!(num(&json!(null)), None);
    }

    #[test]
    fn fmt_usd_scales_magnitudes() {
        assert_eq!(fmt_usd(Some(43_800_000_000.0)), "$43.8B");
        assert_eq!(fmt_usd(Some(63_200_000.0)), "$63.2M");
        assert_eq!(fmt_usd(Some(68_819.0)), "$68,819");
        assert_eq!(fmt_usd(Some(12.5)), "$12.50");
        assert_eq!(fmt_usd(None), "\u{2014}");
    }

    #[test]
    fn fmt_pct_signs_positive_values() {
        assert_eq!(fmt_pct(Some(1.25), 2), "+1.25%");
        assert_eq!(fmt_pct(Some(-2.06), 2), "-2.06%");
        assert_eq!(fmt_pct(Some(0.0), 2), "0.00%");
        assert_eq!(fmt_pct(None, 2), "\u{2014}");
    }

    #[test]
    fn price_extractor_matches_payload_shape() {
        let payload = json!({"data": {"price": 68_819, "change_24h": -2.06}});
        assert_eq!(extract_price(&payload), (Some(68_819.0), Some(-2.06)));
        assert_eq!(extract_price(&json!({})), (None, None));
    }

    #[test]
    fn funding_extractor_converts_fraction_to_percent() {
        let payload = json!({"data": {"rate": 0.001_178, "symbol": "BTC"}});
        let funding = extract_funding(&payload).unwrap();
        assert!((funding - 0.117_8).abs() < 1e-9);
    }

    #[test]
    fn global_extractor_reads_dominance_and_volume() {
        let payload = json!({"data": {
            "btc_dominance": 56.7,
            "eth_dominance": 9.8,
            "total_market_cap_usd": 2_400_000_000_000.0,
            "total_volume_usd": 103_000_000_000.0,
            "market_cap_change_24h_pct": -0.4,
        }});
        let global = extract_global(&payload);
        assert_eq!(global.btc_dominance, Some(56.7));
        assert_eq!(global.total_vol_usd, Some(103_000_000_000.0));
        assert_eq!(global.mcap_change_24h, Some(-0.4));
    }

    #[test]
    fn oi_extractor_reads_usd_and_change() {
        let payload = json!({"data": {"oi_usd": 43_800_000_000.0, "oi_change_24h": -1.91}});
        let oi = extract_oi(&payload);
        assert_eq!(oi.oi_usd, Some(43_800_000_000.0));
        assert_eq!(oi.oi_change_24h, Some(-1.91));
    }

    #[test]
    fn liquidations_prefer_the_all_exchange_row() {
        let payload = json!({"raw": [
            {"exchange": "Binance", "liquidation_usd": 10_000_000.0},
            {"exchange": "All", "liquidation_usd": 63_000_000.0,
             "longLiquidation_usd": 51_000_000.0, "shortLiquidation_usd": 11_000_000.0},
        ]});
        let liq = extract_liquidations(&payload);
        assert_eq!(liq.total_usd, Some(63_000_000.0));
        let long_pct = liq.long_pct.unwrap();
        assert!((long_pct - 80.952_380_952).abs() < 1e-6);
    }

    #[test]
    fn liquidations_fall_back_to_first_row() {
        let payload = json!({"raw": [
            {"exchange": "Binance", "liquidation_usd": 10_000_000.0},
        ]});
        let liq = extract_liquidations(&payload);
        assert_eq!(liq.total_usd, Some(10_000_000.0));
    }

    #[test]
    fn bucket_places_missing_values_in_the_middle() {
        let labels = ("low", "neutral", "high");
        assert_eq!(bucket(None, -1.0, 1.0, labels), "neutral");
        assert_eq!(bucket(Some(-2.0), -1.0, 1.0, labels), "low");
        assert_eq!(bucket(Some(0.0), -1.0, 1.0, labels), "neutral");
        assert_eq!(bucket(Some(1.0), -1.0, 1.0, labels), "high");
    }
}
