use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One token's market data at fetch time. Numeric fields the upstream API
/// sometimes omits are `None` so the filter can count malformed entries
/// instead of guessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub rank: Option<u32>,
    pub price: f64,
    #[serde(default)]
    pub high_24h: Option<f64>,
    #[serde(default)]
    pub low_24h: Option<f64>,
    #[serde(default)]
    pub volume_24h: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub listed_at: Option<DateTime<Utc>>,
}

/// A snapshot that survived the scan, plus the metrics it was judged on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub snapshot: MarketSnapshot,
    /// Drawdown from the 24h high (non-positive) or gain from the 24h low
    /// (non-negative). 0.0 when the high/low is unknown.
    pub price_change_percent: f64,
    /// False when high/low was 0/unknown; such candidates never satisfy a
    /// price-change threshold.
    pub price_change_known: bool,
    pub volume_to_mcap_ratio: f64,
    pub criteria_met: usize,
    pub criteria_total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Volume,
    PriceChange,
    MarketCap,
}

impl SortKey {
    /// Parameter name the market data API expects.
    pub fn as_query_param(&self) -> &'static str {
        match self {
            SortKey::Volume => "volume24h",
            SortKey::PriceChange => "percentChange24h",
            SortKey::MarketCap => "marketCap",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_query_param(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// Outcome of one scheduling tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CycleResult {
    pub posted: bool,
    pub reason: CycleReason,
}

impl CycleResult {
    pub fn posted() -> Self {
        Self {
            posted: true,
            reason: CycleReason::Posted,
        }
    }

    pub fn skipped(reason: CycleReason) -> Self {
        Self {
            posted: false,
            reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleReason {
    Posted,
    NoCandidates,
    BudgetExceeded,
    DataUnavailable,
    GenerationFailed,
    DuplicateContent,
    PublishRejected,
}

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Content generation failed: {0}")]
    GenerationFailed(String),

    #[error("Duplicate content within dedup window")]
    DuplicateContent,

    #[error("Posting budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("Publish rejected: {0}")]
    PublishRejected(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
