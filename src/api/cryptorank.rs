use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::models::{BotError, MarketSnapshot, SortDirection, SortKey};

use super::MarketDataSource;

const BASE_URL: &str = "https://api.cryptorank.io/v2";

pub struct CryptoRankClient {
    client: Client,
    api_key: String,
    base_url: String,
}

/// Numeric fields arrive as numbers, quoted numbers, or nested objects
/// like `{"USD": "1.23"}` depending on the endpoint version. Accept all.
fn safe_float(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(map) => safe_float(map.get("value").or_else(|| map.get("USD"))),
        _ => None,
    }
}

fn parse_snapshot(entry: &Value) -> Option<MarketSnapshot> {
    let id = match entry.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return None,
    };
    let symbol = entry.get("symbol")?.as_str()?.to_string();
    let price = safe_float(entry.get("price"))?;
    let name = entry
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(&symbol)
        .to_string();

    let rank = entry
        .get("rank")
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok());
    let listed_at = entry
        .get("listedAt")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(MarketSnapshot {
        id,
        symbol,
        name,
        rank,
        price,
        high_24h: safe_float(entry.get("high24h")),
        low_24h: safe_float(entry.get("low24h")),
        volume_24h: safe_float(entry.get("volume24h")),
        market_cap: safe_float(entry.get("marketCap")),
        listed_at,
    })
}

impl CryptoRankClient {
    pub fn new(api_key: &str, base_url: Option<&str>, client: Client) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or(BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

#[async_trait]
impl MarketDataSource for CryptoRankClient {
    async fn fetch_snapshots(
        &self,
        limit: u32,
        sort_key: SortKey,
        sort_direction: SortDirection,
    ) -> Result<Vec<MarketSnapshot>, BotError> {
        let url = format!("{}/currencies", self.base_url);
        let limit_param = limit.to_string();
        let params = [
            ("limit", limit_param.as_str()),
            ("convert", "USD"),
            ("status", "active"),
            ("orderBy", sort_key.as_query_param()),
            ("orderDirection", sort_direction.as_query_param()),
        ];

        let response = self
            .client
            .get(&url)
            .query(&params)
            .header("X-Api-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| BotError::DataUnavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BotError::DataUnavailable(format!(
                "market API returned {}: {}",
                status, text
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BotError::DataUnavailable(format!("undecodable body: {}", e)))?;
        let entries = body
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| BotError::DataUnavailable("missing data array".to_string()))?;

        let mut snapshots = Vec::with_capacity(entries.len());
        for entry in entries {
            match parse_snapshot(entry) {
                Some(snapshot) => snapshots.push(snapshot),
                None => debug!("dropping market entry without id/symbol/price"),
            }
        }
        info!("📊 Fetched {} market snapshots", snapshots.len());
        Ok(snapshots)
    }
}
