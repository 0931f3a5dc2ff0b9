use std::collections::{HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::BotError;

/// One published post, as the tracker remembers it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub persona: String,
    pub fingerprint: String,
    pub post_id: String,
}

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub dedup_window: Duration,
    pub daily_cap: u32,
    pub category_caps: HashMap<String, u32>,
    pub min_interval: Duration,
    pub max_records: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::hours(24),
            daily_cap: 17,
            category_caps: HashMap::new(),
            min_interval: Duration::minutes(30),
            max_records: 1000,
        }
    }
}

impl HistoryConfig {
    /// Records younger than this must survive pruning and eviction: the
    /// dedup and budget checks both still need them.
    fn active_window(&self) -> Duration {
        std::cmp::max(self.dedup_window, Duration::hours(24))
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: VecDeque<PostRecord>,
    capacity_deferred: bool,
}

/// Persisted post history: dedup, rate budget, and recent-topic queries.
/// All reads take the lock briefly; `record_post` is the only mutator.
pub struct TweetHistory {
    path: PathBuf,
    config: HistoryConfig,
    inner: RwLock<Inner>,
}

impl TweetHistory {
    /// Load history from `path`. A missing or unreadable file starts the
    /// tracker empty; the bot must come up either way.
    pub fn load(path: impl Into<PathBuf>, config: HistoryConfig) -> Self {
        let path = path.into();
        let records = match File::open(&path) {
            Ok(file) => match serde_json::from_reader::<_, Vec<PostRecord>>(BufReader::new(file)) {
                Ok(records) => {
                    info!("📚 Loaded {} posts from history", records.len());
                    records.into()
                }
                Err(e) => {
                    warn!("History file {} is corrupt, starting fresh: {}", path.display(), e);
                    VecDeque::new()
                }
            },
            Err(_) => {
                info!("No history at {}, starting fresh", path.display());
                VecDeque::new()
            }
        };
        Self {
            path,
            config,
            inner: RwLock::new(Inner {
                records,
                capacity_deferred: false,
            }),
        }
    }

    pub fn is_duplicate(&self, fingerprint: &str) -> bool {
        self.is_duplicate_at(fingerprint, Utc::now())
    }

    /// True iff an equal fingerprint was posted strictly inside the dedup
    /// window ending at `now`.
    pub fn is_duplicate_at(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.config.dedup_window;
        self.inner
            .read()
            .records
            .iter()
            .any(|r| r.timestamp > cutoff && r.fingerprint == fingerprint)
    }

    pub fn may_post_now(&self, category: Option<&str>) -> bool {
        self.may_post_now_at(category, Utc::now())
    }

    /// Budget check: rolling 24h total cap, optional per-category cap, and
    /// minimum spacing since the last post.
    pub fn may_post_now_at(&self, category: Option<&str>, now: DateTime<Utc>) -> bool {
        let inner = self.inner.read();
        let day_ago = now - Duration::hours(24);
        let in_window: Vec<&PostRecord> = inner
            .records
            .iter()
            .filter(|r| r.timestamp > day_ago)
            .collect();

        if in_window.len() >= self.config.daily_cap as usize {
            return false;
        }
        if let Some(category) = category {
            if let Some(cap) = self.config.category_caps.get(category) {
                let used = in_window.iter().filter(|r| r.category == category).count();
                if used >= *cap as usize {
                    return false;
                }
            }
        }
        if let Some(last) = inner.records.back() {
            if now - last.timestamp < self.config.min_interval {
                return false;
            }
        }
        true
    }

    /// Append a record, prune what has aged out, and persist. The sole
    /// mutator. A persist failure leaves the in-memory state intact and is
    /// surfaced as `StorageError`.
    pub fn record_post(
        &self,
        fingerprint: &str,
        category: &str,
        persona: &str,
        post_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BotError> {
        let snapshot = {
            let mut inner = self.inner.write();
            inner.records.push_back(PostRecord {
                timestamp: now,
                category: category.to_string(),
                persona: persona.to_string(),
                fingerprint: fingerprint.to_string(),
                post_id: post_id.to_string(),
            });
            Self::prune_locked(&mut inner, &self.config, now);
            inner.records.iter().cloned().collect::<Vec<_>>()
        };
        self.persist(&snapshot)
    }

    /// Drop records older than the active window, then enforce capacity.
    pub fn prune_at(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.write();
        Self::prune_locked(&mut inner, &self.config, now);
    }

    fn prune_locked(inner: &mut Inner, config: &HistoryConfig, now: DateTime<Utc>) {
        let cutoff = now - config.active_window();
        while inner
            .records
            .front()
            .map_or(false, |r| r.timestamp < cutoff)
        {
            inner.records.pop_front();
        }

        // Capacity eviction is oldest-first but never touches a record the
        // dedup/budget checks still depend on. When blocked it defers and
        // flags the pressure instead.
        inner.capacity_deferred = false;
        while inner.records.len() > config.max_records {
            let oldest_in_window = inner
                .records
                .front()
                .map_or(true, |r| r.timestamp >= cutoff);
            if oldest_in_window {
                inner.capacity_deferred = true;
                warn!(
                    "History over capacity ({} > {}) but oldest record is still active, deferring eviction",
                    inner.records.len(),
                    config.max_records
                );
                break;
            }
            inner.records.pop_front();
        }
    }

    /// True when the last prune wanted to evict but every candidate was
    /// still inside the active window.
    pub fn capacity_pressure(&self) -> bool {
        self.inner.read().capacity_deferred
    }

    /// Most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<PostRecord> {
        self.inner
            .read()
            .records
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Posts inside the rolling 24h window ending at `now`.
    pub fn posts_in_window(&self, now: DateTime<Utc>) -> usize {
        let day_ago = now - Duration::hours(24);
        self.inner
            .read()
            .records
            .iter()
            .filter(|r| r.timestamp > day_ago)
            .count()
    }

    pub fn recent_symbols(&self, days: i64) -> Vec<String> {
        self.recent_symbols_at(days, Utc::now())
    }

    /// `$TOKEN` cashtags mentioned in posts from the last `days` days, so
    /// the scheduler can skip tokens the bot already covered.
    pub fn recent_symbols_at(&self, days: i64, now: DateTime<Utc>) -> Vec<String> {
        let cutoff = now - Duration::days(days);
        let mut symbols = Vec::new();
        for record in self.inner.read().records.iter() {
            if record.timestamp <= cutoff {
                continue;
            }
            for token in record.fingerprint.split_whitespace() {
                if let Some(symbol) = token.strip_prefix('$') {
                    if !symbol.is_empty()
                        && symbol.chars().all(|c| c.is_ascii_alphanumeric())
                        && !symbols.iter().any(|s: &String| s.eq_ignore_ascii_case(symbol))
                    {
                        symbols.push(symbol.to_uppercase());
                    }
                }
            }
        }
        symbols
    }

    fn persist(&self, records: &[PostRecord]) -> Result<(), BotError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| BotError::StorageError(format!("create {}: {}", parent.display(), e)))?;
            }
        }
        let file = File::create(&self.path)
            .map_err(|e| BotError::StorageError(format!("open {}: {}", self.path.display(), e)))?;
        serde_json::to_writer(BufWriter::new(file), records)
            .map_err(|e| BotError::StorageError(format!("write {}: {}", self.path.display(), e)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_path() -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "elai-history-{}-{}.json",
            std::process::id(),
            n
        ))
    }

    fn config() -> HistoryConfig {
        HistoryConfig {
            dedup_window: Duration::hours(24),
            daily_cap: 7,
            category_caps: HashMap::new(),
            min_interval: Duration::minutes(30),
            max_records: 1000,
        }
    }

    #[test]
    fn duplicate_inside_window_not_at_edge() {
        let history = TweetHistory::load(temp_path(), config());
        let now = Utc::now();
        history
            .record_post("hello $sol world", "gem_alpha", "alpha_hunter", "1", now)
            .unwrap();

        assert!(history.is_duplicate_at("hello $sol world", now + Duration::hours(23)));
        // The window is strict: a post exactly dedup_window old no longer blocks.
        assert!(!history.is_duplicate_at("hello $sol world", now + Duration::hours(24)));
        assert!(!history.is_duplicate_at("different text", now + Duration::hours(1)));
    }

    #[test]
    fn daily_cap_blocks_then_ages_out() {
        let history = TweetHistory::load(temp_path(), config());
        let start = Utc::now();
        for i in 0..7 {
            let at = start + Duration::hours(i * 3); // 0h..18h
            assert!(history.may_post_now_at(None, at));
            history
                .record_post(&format!("post number {}", i), "market_watch", "degen_trader", &i.to_string(), at)
                .unwrap();
        }
        let after_seventh = start + Duration::hours(19);
        assert!(!history.may_post_now_at(None, after_seventh));

        // 24h after the first post it falls out of the rolling window.
        let next_day = start + Duration::hours(24) + Duration::minutes(1);
        assert!(history.may_post_now_at(None, next_day));
    }

    #[test]
    fn min_interval_blocks_back_to_back_posts() {
        let history = TweetHistory::load(temp_path(), config());
        let now = Utc::now();
        history
            .record_post("first take", "market_watch", "tech_analyst", "1", now)
            .unwrap();
        assert!(!history.may_post_now_at(None, now + Duration::minutes(10)));
        assert!(history.may_post_now_at(None, now + Duration::minutes(31)));
    }

    #[test]
    fn category_cap_is_independent_of_daily_cap() {
        let mut cfg = config();
        cfg.category_caps.insert("gem_alpha".to_string(), 1);
        let history = TweetHistory::load(temp_path(), cfg);
        let now = Utc::now();
        history
            .record_post("gem one", "gem_alpha", "alpha_hunter", "1", now)
            .unwrap();
        let later = now + Duration::hours(1);
        assert!(!history.may_post_now_at(Some("gem_alpha"), later));
        assert!(history.may_post_now_at(Some("market_watch"), later));
    }

    #[test]
    fn reload_from_disk_reproduces_checks() {
        let path = temp_path();
        let now = Utc::now();
        {
            let history = TweetHistory::load(&path, config());
            history
                .record_post("persisted $btc content", "market_watch", "insider_ai", "42", now)
                .unwrap();
        }
        let reloaded = TweetHistory::load(&path, config());
        assert!(reloaded.is_duplicate_at("persisted $btc content", now + Duration::hours(1)));
        assert_eq!(reloaded.posts_in_window(now + Duration::hours(1)), 1);
        assert!(!reloaded.may_post_now_at(None, now + Duration::minutes(5)));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let path = temp_path();
        std::fs::write(&path, b"{not json").unwrap();
        let history = TweetHistory::load(&path, config());
        assert!(history.recent(10).is_empty());
        assert!(history.may_post_now_at(None, Utc::now()));
    }

    #[test]
    fn capacity_eviction_defers_for_active_records() {
        let mut cfg = config();
        cfg.max_records = 2;
        let history = TweetHistory::load(temp_path(), cfg);
        let now = Utc::now();
        for i in 0..3 {
            history
                .record_post(&format!("active {}", i), "market_watch", "degen_trader", &i.to_string(), now + Duration::minutes(i))
                .unwrap();
        }
        // All three are inside the active window, so nothing was evicted.
        assert_eq!(history.recent(10).len(), 3);
        assert!(history.capacity_pressure());

        // Once the oldest ages out, pruning drops it and pressure clears.
        history.prune_at(now + Duration::hours(24) + Duration::minutes(1));
        assert_eq!(history.recent(10).len(), 2);
        assert!(!history.capacity_pressure());
    }

    #[test]
    fn recent_symbols_extracts_cashtags() {
        let history = TweetHistory::load(temp_path(), config());
        let now = Utc::now();
        history
            .record_post("watching $pepe and $wif pump", "gem_alpha", "degen_trader", "1", now)
            .unwrap();
        history
            .record_post("no tags here", "market_watch", "tech_analyst", "2", now + Duration::minutes(31))
            .unwrap();
        let symbols = history.recent_symbols_at(1, now + Duration::hours(1));
        assert_eq!(symbols, vec!["PEPE".to_string(), "WIF".to_string()]);
        assert!(history
            .recent_symbols_at(1, now + Duration::days(2))
            .is_empty());
    }
}
