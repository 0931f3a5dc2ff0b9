use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use tracing::warn;

use crate::history::HistoryConfig;
use crate::models::BotError;
use crate::strategy::SignalConfig;

/// Loop timing and network bounds.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub cycle_minutes: u64,
    pub fetch_limit: u32,
    pub allow_near_matches: bool,
    pub request_timeout_secs: u64,
    /// Skip candidates whose symbol appeared in posts this recent.
    pub recent_symbol_days: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cycle_minutes: 240,
            fetch_limit: 500,
            allow_near_matches: true,
            request_timeout_secs: 30,
            recent_symbol_days: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub access_token: String,
    pub model: String,
}

/// Everything the binary needs, assembled from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub cryptorank_api_key: String,
    pub cryptorank_api_url: Option<String>,
    pub twitter_bearer_token: String,
    pub twitter_api_url: Option<String>,
    /// `None` means template-only generation.
    pub llm: Option<LlmConfig>,
    pub schedule: ScheduleConfig,
    pub signal: SignalConfig,
    pub history: HistoryConfig,
    pub data_dir: PathBuf,
    pub health_port: u16,
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn parsed_opt<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}

fn required(key: &str) -> Result<String, BotError> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| BotError::ConfigError(format!("{} must be set", key)))
}

impl Config {
    pub fn from_env() -> Result<Self, BotError> {
        let signal = SignalConfig {
            min_market_cap: parsed_opt("ELAI_MIN_MARKET_CAP"),
            max_market_cap: Some(parsed("ELAI_MAX_MARKET_CAP", 50_000_000.0)),
            min_volume: Some(parsed("ELAI_MIN_VOLUME", 100_000.0)),
            min_volume_to_mcap_ratio: Some(parsed("ELAI_MIN_VOL_MCAP_RATIO", 0.05)),
            min_price_change_pct: Some(parsed("ELAI_MIN_PRICE_CHANGE", 10.0)),
            max_listing_age_days: parsed_opt("ELAI_MAX_LISTING_AGE_DAYS"),
            ..SignalConfig::default()
        };

        let history = HistoryConfig {
            dedup_window: Duration::hours(parsed("ELAI_DEDUP_HOURS", 24)),
            daily_cap: parsed("ELAI_DAILY_CAP", 17),
            min_interval: Duration::minutes(parsed("ELAI_MIN_INTERVAL_MINUTES", 30)),
            max_records: parsed("ELAI_MAX_RECORDS", 1000),
            ..HistoryConfig::default()
        };

        let schedule = ScheduleConfig {
            cycle_minutes: parsed("ELAI_CYCLE_MINUTES", 240),
            fetch_limit: parsed("ELAI_FETCH_LIMIT", 500),
            allow_near_matches: parsed("ELAI_ALLOW_NEAR_MATCHES", true),
            request_timeout_secs: parsed("ELAI_REQUEST_TIMEOUT_SECS", 30),
            ..ScheduleConfig::default()
        };

        // LLM credentials are optional as a set; a partial set is a
        // misconfiguration worth flagging, not silently ignoring.
        let llm = match (
            env::var("AI_API_URL").ok().filter(|v| !v.is_empty()),
            env::var("AI_ACCESS_TOKEN").ok().filter(|v| !v.is_empty()),
        ) {
            (Some(api_url), Some(access_token)) => Some(LlmConfig {
                api_url,
                access_token,
                model: env::var("AI_MODEL_NAME")
                    .unwrap_or_else(|_| "meta-llama/Llama-3.3-70B-Instruct".to_string()),
            }),
            (None, None) => None,
            _ => {
                return Err(BotError::ConfigError(
                    "AI_API_URL and AI_ACCESS_TOKEN must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            cryptorank_api_key: required("CRYPTORANK_API_KEY")?,
            cryptorank_api_url: env::var("CRYPTORANK_API_URL").ok(),
            twitter_bearer_token: required("TWITTER_BEARER_TOKEN")?,
            twitter_api_url: env::var("TWITTER_API_URL").ok(),
            llm,
            schedule,
            signal,
            history,
            data_dir: PathBuf::from(
                env::var("ELAI_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            ),
            health_port: parsed("ELAI_HEALTH_PORT", 8080),
        })
    }

    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join("tweet_history.json")
    }
}
