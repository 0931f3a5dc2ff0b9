use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{MarketSnapshot, ScoredCandidate, SortDirection, SortKey};

/// Numeric thresholds for the market scan. A `None` threshold is simply not
/// configured and never counts against a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    pub min_market_cap: Option<f64>,
    pub max_market_cap: Option<f64>,
    pub min_volume: Option<f64>,
    pub min_volume_to_mcap_ratio: Option<f64>,
    /// Minimum absolute price change percent over 24h.
    pub min_price_change_pct: Option<f64>,
    pub max_listing_age_days: Option<u32>,
    pub sort_key: SortKey,
    pub sort_direction: SortDirection,
    /// Symbols never considered, regardless of metrics.
    pub excluded_symbols: Vec<String>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_market_cap: None,
            max_market_cap: Some(50_000_000.0),
            min_volume: Some(100_000.0),
            min_volume_to_mcap_ratio: Some(0.05),
            min_price_change_pct: Some(10.0),
            max_listing_age_days: None,
            sort_key: SortKey::Volume,
            sort_direction: SortDirection::Descending,
            excluded_symbols: vec![
                "USDT".to_string(),
                "USDC".to_string(),
                "DAI".to_string(),
                "BUSD".to_string(),
            ],
        }
    }
}

impl SignalConfig {
    /// Number of thresholds actually configured.
    pub fn criteria_total(&self) -> usize {
        [
            self.min_market_cap.is_some(),
            self.max_market_cap.is_some(),
            self.min_volume.is_some(),
            self.min_volume_to_mcap_ratio.is_some(),
            self.min_price_change_pct.is_some(),
            self.max_listing_age_days.is_some(),
        ]
        .iter()
        .filter(|c| **c)
        .count()
    }
}

/// Result of one scan over a snapshot batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Candidates satisfying every configured threshold, in sort order.
    pub perfect: Vec<ScoredCandidate>,
    /// Candidates satisfying at least two configured thresholds, only
    /// populated when the caller asked for relaxed mode. Never overlaps
    /// with `perfect`.
    pub near: Vec<ScoredCandidate>,
    /// Snapshots dropped for missing volume or market cap.
    pub skipped_malformed: usize,
}

/// volume/mcap with the divide-by-zero guard the rest of the pipeline
/// relies on: 0 market cap (or unknown) means ratio 0.
pub fn volume_to_mcap_ratio(volume_24h: f64, market_cap: f64) -> f64 {
    if market_cap > 0.0 {
        volume_24h / market_cap
    } else {
        0.0
    }
}

/// 24h price change derived from the high/low band. Below the 24h high the
/// value is the drawdown from that high (non-positive); otherwise the gain
/// from the 24h low (non-negative). Unknown band yields `None`.
pub fn price_change_percent(price: f64, high_24h: f64, low_24h: f64) -> Option<f64> {
    if high_24h <= 0.0 || low_24h <= 0.0 {
        return None;
    }
    if price < high_24h {
        Some((price - high_24h) / high_24h * 100.0)
    } else {
        Some((price - low_24h) / low_24h * 100.0)
    }
}

fn is_likely_stablecoin(snapshot: &MarketSnapshot) -> bool {
    if !(0.95..=1.05).contains(&snapshot.price) {
        return false;
    }
    let symbol = snapshot.symbol.to_uppercase();
    let name = snapshot.name.to_uppercase();
    ["USD", "USDT", "USDC", "DAI", "BUSD", "TUSD", "FDUSD"]
        .iter()
        .any(|tag| symbol.contains(tag) || name.contains(tag))
}

struct Judgement {
    candidate: ScoredCandidate,
    all_met: bool,
}

fn judge(snapshot: &MarketSnapshot, config: &SignalConfig, now: DateTime<Utc>) -> Option<Judgement> {
    // Volume and market cap are required for any scoring at all.
    let volume = snapshot.volume_24h?;
    let market_cap = snapshot.market_cap?;

    let ratio = volume_to_mcap_ratio(volume, market_cap);
    let change = price_change_percent(
        snapshot.price,
        snapshot.high_24h.unwrap_or(0.0),
        snapshot.low_24h.unwrap_or(0.0),
    );

    let mut total = 0;
    let mut met = 0;
    let mut check = |configured: bool, passed: bool| {
        if configured {
            total += 1;
            if passed {
                met += 1;
            }
        }
    };

    check(
        config.min_market_cap.is_some(),
        config.min_market_cap.map_or(false, |min| market_cap >= min),
    );
    check(
        config.max_market_cap.is_some(),
        config
            .max_market_cap
            .map_or(false, |max| market_cap > 0.0 && market_cap <= max),
    );
    check(
        config.min_volume.is_some(),
        config.min_volume.map_or(false, |min| volume >= min),
    );
    check(
        config.min_volume_to_mcap_ratio.is_some(),
        config
            .min_volume_to_mcap_ratio
            .map_or(false, |min| ratio >= min),
    );
    check(
        config.min_price_change_pct.is_some(),
        match (config.min_price_change_pct, change) {
            (Some(min), Some(pct)) => pct.abs() >= min,
            _ => false,
        },
    );
    check(
        config.max_listing_age_days.is_some(),
        match (config.max_listing_age_days, snapshot.listed_at) {
            (Some(max_days), Some(listed)) => {
                now.signed_duration_since(listed) <= chrono::Duration::days(i64::from(max_days))
            }
            // Unknown listing date cannot prove the token is young enough.
            _ => false,
        },
    );

    Some(Judgement {
        candidate: ScoredCandidate {
            snapshot: snapshot.clone(),
            price_change_percent: change.unwrap_or(0.0),
            price_change_known: change.is_some(),
            volume_to_mcap_ratio: ratio,
            criteria_met: met,
            criteria_total: total,
        },
        all_met: met == total,
    })
}

fn sort_candidates(candidates: &mut [ScoredCandidate], key: SortKey, direction: SortDirection) {
    candidates.sort_by(|a, b| {
        let (ka, kb) = match key {
            SortKey::Volume => (
                a.snapshot.volume_24h.unwrap_or(0.0),
                b.snapshot.volume_24h.unwrap_or(0.0),
            ),
            SortKey::PriceChange => (
                a.price_change_percent.abs(),
                b.price_change_percent.abs(),
            ),
            SortKey::MarketCap => (
                a.snapshot.market_cap.unwrap_or(0.0),
                b.snapshot.market_cap.unwrap_or(0.0),
            ),
        };
        let ordering = ka.partial_cmp(&kb).unwrap_or(Ordering::Equal);
        let ordering = match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        // Stable tie-break so repeated scans order identically.
        ordering.then_with(|| a.snapshot.id.cmp(&b.snapshot.id))
    });
}

/// Pure scan over a snapshot batch: rank everything passing all configured
/// thresholds, and in relaxed mode also everything passing at least two.
pub fn scan(
    snapshots: &[MarketSnapshot],
    config: &SignalConfig,
    relaxed: bool,
    now: DateTime<Utc>,
) -> ScanReport {
    let mut report = ScanReport::default();
    let mut seen_symbols: HashSet<String> = HashSet::new();

    for snapshot in snapshots {
        let symbol = snapshot.symbol.to_uppercase();
        if symbol.is_empty() || !seen_symbols.insert(symbol.clone()) {
            continue;
        }
        if config.excluded_symbols.iter().any(|s| s.eq_ignore_ascii_case(&symbol))
            || is_likely_stablecoin(snapshot)
        {
            continue;
        }

        match judge(snapshot, config, now) {
            Some(judgement) if judgement.all_met => report.perfect.push(judgement.candidate),
            Some(judgement) if relaxed && judgement.candidate.criteria_met >= 2 => {
                report.near.push(judgement.candidate)
            }
            Some(_) => {}
            None => {
                debug!(symbol = %snapshot.symbol, "skipping snapshot with missing numeric fields");
                report.skipped_malformed += 1;
            }
        }
    }

    sort_candidates(&mut report.perfect, config.sort_key, config.sort_direction);
    sort_candidates(&mut report.near, config.sort_key, config.sort_direction);
    report
}
