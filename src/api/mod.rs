pub mod cryptorank;
pub mod twitter;

use async_trait::async_trait;

use crate::models::{BotError, MarketSnapshot, SortDirection, SortKey};

/// Where market snapshots come from. The scheduler only sees this trait so
/// tests can feed it canned batches.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_snapshots(
        &self,
        limit: u32,
        sort_key: SortKey,
        sort_direction: SortDirection,
    ) -> Result<Vec<MarketSnapshot>, BotError>;
}

/// Where finished posts go. Returns the platform's id for the new post.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn post(&self, text: &str) -> Result<String, BotError>;
}
