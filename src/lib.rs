pub mod api;
pub mod bot;
pub mod config;
pub mod content;
pub mod history;
pub mod middleware;
pub mod models;
pub mod personality;
pub mod routes;
pub mod strategy;

// Re-export main components
pub use api::{cryptorank::CryptoRankClient, twitter::TwitterClient, MarketDataSource, Publisher};
pub use bot::{BotStatus, ElaiBot};
pub use config::Config;
pub use content::{ContentGenerator, GenerationMode};
pub use history::TweetHistory;
pub use models::{BotError, CycleReason, CycleResult, MarketSnapshot, ScoredCandidate};
pub use strategy::{ScanReport, SignalConfig};
