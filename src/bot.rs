use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time;
use tracing::{error, info, warn};

use crate::api::{MarketDataSource, Publisher};
use crate::config::ScheduleConfig;
use crate::content::{fingerprint, ContentGenerator};
use crate::history::TweetHistory;
use crate::models::{BotError, CycleReason, CycleResult, ScoredCandidate};
use crate::personality::PersonaState;
use crate::strategy::{self, SignalConfig};

const GEM_CATEGORY: &str = "gem_alpha";
const WATCH_CATEGORY: &str = "market_watch";

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub last_tick: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_reason: Option<CycleReason>,
    pub cycles: u64,
    pub posts_today: usize,
    pub capacity_pressure: bool,
}

/// Shared between the scheduling loop (writer) and the HTTP server (reader).
#[derive(Default)]
pub struct BotStatus {
    inner: RwLock<StatusSnapshot>,
}

impl BotStatus {
    pub fn record(&self, now: DateTime<Utc>, result: CycleResult) {
        let mut inner = self.inner.write();
        inner.last_tick = Some(now);
        inner.last_reason = Some(result.reason);
        inner.cycles += 1;
        if result.posted {
            inner.last_success = Some(now);
        }
    }

    pub fn snapshot(&self, history: &TweetHistory, now: DateTime<Utc>) -> StatusSnapshot {
        let mut snapshot = self.inner.read().clone();
        snapshot.posts_today = history.posts_in_window(now);
        snapshot.capacity_pressure = history.capacity_pressure();
        snapshot
    }
}

/// The bot: owns the tick sequence and the collaborators it runs against.
pub struct ElaiBot {
    market: Arc<dyn MarketDataSource>,
    llm: Option<Arc<dyn ContentGenerator>>,
    templates: Arc<dyn ContentGenerator>,
    publisher: Arc<dyn Publisher>,
    history: Arc<TweetHistory>,
    signal: SignalConfig,
    schedule: ScheduleConfig,
    persona: RwLock<PersonaState>,
    status: Arc<BotStatus>,
}

impl ElaiBot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        llm: Option<Arc<dyn ContentGenerator>>,
        templates: Arc<dyn ContentGenerator>,
        publisher: Arc<dyn Publisher>,
        history: Arc<TweetHistory>,
        signal: SignalConfig,
        schedule: ScheduleConfig,
        status: Arc<BotStatus>,
    ) -> Self {
        Self {
            market,
            llm,
            templates,
            publisher,
            history,
            signal,
            schedule,
            persona: RwLock::new(PersonaState::default()),
            status,
        }
    }

    pub fn status(&self) -> Arc<BotStatus> {
        Arc::clone(&self.status)
    }

    /// Tick forever. Every outcome is tick-local; only wiring failures
    /// before the first tick can abort this loop.
    pub async fn run(&self) {
        let mut interval =
            time::interval(StdDuration::from_secs(self.schedule.cycle_minutes * 60));
        loop {
            interval.tick().await;
            let now = Utc::now();
            let result = self.run_cycle(now).await;
            self.status.record(now, result);
            match result.reason {
                CycleReason::Posted => info!("✅ Cycle complete: posted"),
                reason => info!("⏭️ Cycle complete: skipped ({:?})", reason),
            }
        }
    }

    /// One tick: budget → fetch → scan → generate → dedup → publish → record.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleResult {
        self.history.prune_at(now);
        if !self.history.may_post_now_at(None, now) {
            info!("Budget exhausted, skipping tick");
            return CycleResult::skipped(CycleReason::BudgetExceeded);
        }

        let snapshots = match time::timeout(
            StdDuration::from_secs(self.schedule.request_timeout_secs),
            self.market.fetch_snapshots(
                self.schedule.fetch_limit,
                self.signal.sort_key,
                self.signal.sort_direction,
            ),
        )
        .await
        {
            Ok(Ok(snapshots)) => snapshots,
            Ok(Err(e)) => {
                warn!("Market fetch failed: {}", e);
                return CycleResult::skipped(CycleReason::DataUnavailable);
            }
            Err(_) => {
                warn!("Market fetch timed out");
                return CycleResult::skipped(CycleReason::DataUnavailable);
            }
        };

        let (candidates, category) = self.pick_candidates(&snapshots, now);
        if candidates.is_empty() {
            info!("No candidates passed the filter");
            return CycleResult::skipped(CycleReason::NoCandidates);
        }
        if !self.history.may_post_now_at(Some(category), now) {
            info!("Category {} budget exhausted", category);
            return CycleResult::skipped(CycleReason::BudgetExceeded);
        }

        let persona = self.persona.read().clone();
        let text = match self.generate(&candidates, &persona, 0).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Generation failed: {}", e);
                return CycleResult::skipped(CycleReason::GenerationFailed);
            }
        };

        // One varied retry on a duplicate, then give up for this tick.
        let mut content_fp = fingerprint(&text);
        let text = if self.history.is_duplicate_at(&content_fp, now) {
            info!("Duplicate content, regenerating with variation");
            let retry = match self.generate(&candidates, &persona, 1).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Varied regeneration failed: {}", e);
                    return CycleResult::skipped(CycleReason::GenerationFailed);
                }
            };
            content_fp = fingerprint(&retry);
            if self.history.is_duplicate_at(&content_fp, now) {
                return CycleResult::skipped(CycleReason::DuplicateContent);
            }
            retry
        } else {
            text
        };

        let post_id = match self.publisher.post(&text).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Publish rejected: {}", e);
                return CycleResult::skipped(CycleReason::PublishRejected);
            }
        };

        if let Err(e) = self
            .history
            .record_post(&content_fp, category, persona.current().name(), &post_id, now)
        {
            // The post is out; losing the record is bad but not fatal.
            error!("Failed to persist post record: {}", e);
        }
        *self.persona.write() = persona.after_post();

        CycleResult::posted()
    }

    /// Strict scan first; relax only when it finds nothing and config
    /// allows. Tokens already posted about recently are dropped.
    fn pick_candidates(
        &self,
        snapshots: &[crate::models::MarketSnapshot],
        now: DateTime<Utc>,
    ) -> (Vec<ScoredCandidate>, &'static str) {
        let report = strategy::scan(
            snapshots,
            &self.signal,
            self.schedule.allow_near_matches,
            now,
        );
        if report.skipped_malformed > 0 {
            warn!("{} snapshots had missing numeric fields", report.skipped_malformed);
        }

        let recent = self
            .history
            .recent_symbols_at(self.schedule.recent_symbol_days, now);
        let fresh = |c: &ScoredCandidate| {
            !recent
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&c.snapshot.symbol))
        };

        let perfect: Vec<ScoredCandidate> =
            report.perfect.into_iter().filter(|c| fresh(c)).collect();
        if !perfect.is_empty() {
            return (perfect, GEM_CATEGORY);
        }
        let near: Vec<ScoredCandidate> = report.near.into_iter().filter(|c| fresh(c)).collect();
        (near, WATCH_CATEGORY)
    }

    async fn generate(
        &self,
        candidates: &[ScoredCandidate],
        persona: &PersonaState,
        variation: u32,
    ) -> Result<String, BotError> {
        if let Some(llm) = &self.llm {
            match llm.generate(candidates, persona, variation).await {
                Ok(text) => return Ok(text),
                Err(e) => warn!("LLM generation failed, falling back to templates: {}", e),
            }
        }
        self.templates.generate(candidates, persona, variation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MarketDataSource, Publisher};
    use crate::history::HistoryConfig;
    use crate::models::{MarketSnapshot, SortDirection, SortKey};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_history(config: HistoryConfig) -> Arc<TweetHistory> {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "elai-bot-{}-{}.json",
            std::process::id(),
            n
        ));
        Arc::new(TweetHistory::load(path, config))
    }

    fn gem(symbol: &str) -> MarketSnapshot {
        MarketSnapshot {
            id: symbol.to_lowercase(),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            rank: None,
            price: 2.0,
            high_24h: Some(2.8),
            low_24h: Some(1.5),
            volume_24h: Some(5_000_000.0),
            market_cap: Some(20_000_000.0),
            listed_at: None,
        }
    }

    struct FakeMarket {
        snapshots: Vec<MarketSnapshot>,
        fail: bool,
    }

    #[async_trait]
    impl MarketDataSource for FakeMarket {
        async fn fetch_snapshots(
            &self,
            _limit: u32,
            _sort_key: SortKey,
            _sort_direction: SortDirection,
        ) -> Result<Vec<MarketSnapshot>, BotError> {
            if self.fail {
                Err(BotError::DataUnavailable("fake outage".to_string()))
            } else {
                Ok(self.snapshots.clone())
            }
        }
    }

    struct FakeGenerator {
        base: String,
        vary: bool,
        fail: bool,
    }

    #[async_trait]
    impl ContentGenerator for FakeGenerator {
        async fn generate(
            &self,
            _candidates: &[ScoredCandidate],
            _persona: &PersonaState,
            variation: u32,
        ) -> Result<String, BotError> {
            if self.fail {
                return Err(BotError::GenerationFailed("fake".to_string()));
            }
            if self.vary && variation > 0 {
                Ok(format!("{} take {}", self.base, variation))
            } else {
                Ok(self.base.clone())
            }
        }
    }

    struct FakePublisher {
        reject: bool,
        posts: parking_lot::Mutex<Vec<String>>,
    }

    impl FakePublisher {
        fn new(reject: bool) -> Self {
            Self {
                reject,
                posts: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn post(&self, text: &str) -> Result<String, BotError> {
            if self.reject {
                return Err(BotError::PublishRejected("403 duplicate".to_string()));
            }
            self.posts.lock().push(text.to_string());
            Ok(format!("tweet-{}", self.posts.lock().len()))
        }
    }

    fn bot(
        market: FakeMarket,
        llm: Option<FakeGenerator>,
        template: FakeGenerator,
        publisher: Arc<FakePublisher>,
        history: Arc<TweetHistory>,
    ) -> ElaiBot {
        ElaiBot::new(
            Arc::new(market),
            llm.map(|g| Arc::new(g) as Arc<dyn ContentGenerator>),
            Arc::new(template),
            publisher,
            history,
            SignalConfig::default(),
            ScheduleConfig::default(),
            Arc::new(BotStatus::default()),
        )
    }

    fn template(base: &str) -> FakeGenerator {
        FakeGenerator {
            base: base.to_string(),
            vary: true,
            fail: false,
        }
    }

    #[tokio::test]
    async fn happy_path_posts_and_records() {
        let history = temp_history(HistoryConfig::default());
        let publisher = Arc::new(FakePublisher::new(false));
        let bot = bot(
            FakeMarket { snapshots: vec![gem("WIF")], fail: false },
            None,
            template("fresh $WIF alpha"),
            Arc::clone(&publisher),
            Arc::clone(&history),
        );

        let now = Utc::now();
        let result = bot.run_cycle(now).await;
        assert!(result.posted);
        assert_eq!(result.reason, CycleReason::Posted);
        assert_eq!(publisher.posts.lock().len(), 1);
        assert_eq!(history.posts_in_window(now), 1);
        assert_eq!(history.recent(1)[0].category, "gem_alpha");
    }

    #[tokio::test]
    async fn budget_pre_check_skips_without_fetching() {
        let history = temp_history(HistoryConfig {
            daily_cap: 1,
            ..HistoryConfig::default()
        });
        let now = Utc::now();
        history
            .record_post("used up", "gem_alpha", "alpha_hunter", "1", now)
            .unwrap();

        let bot = bot(
            FakeMarket { snapshots: vec![gem("WIF")], fail: true }, // would error if reached
            None,
            template("anything"),
            Arc::new(FakePublisher::new(false)),
            history,
        );
        let result = bot.run_cycle(now + chrono::Duration::hours(1)).await;
        assert_eq!(result.reason, CycleReason::BudgetExceeded);
    }

    #[tokio::test]
    async fn market_outage_is_data_unavailable() {
        let bot = bot(
            FakeMarket { snapshots: vec![], fail: true },
            None,
            template("anything"),
            Arc::new(FakePublisher::new(false)),
            temp_history(HistoryConfig::default()),
        );
        let result = bot.run_cycle(Utc::now()).await;
        assert_eq!(result.reason, CycleReason::DataUnavailable);
        assert!(!result.posted);
    }

    #[tokio::test]
    async fn empty_scan_is_no_candidates() {
        let bot = bot(
            FakeMarket { snapshots: vec![], fail: false },
            None,
            template("anything"),
            Arc::new(FakePublisher::new(false)),
            temp_history(HistoryConfig::default()),
        );
        let result = bot.run_cycle(Utc::now()).await;
        assert_eq!(result.reason, CycleReason::NoCandidates);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_templates() {
        let publisher = Arc::new(FakePublisher::new(false));
        let bot = bot(
            FakeMarket { snapshots: vec![gem("WIF")], fail: false },
            Some(FakeGenerator {
                base: String::new(),
                vary: false,
                fail: true,
            }),
            template("template fallback $WIF"),
            Arc::clone(&publisher),
            temp_history(HistoryConfig::default()),
        );
        let result = bot.run_cycle(Utc::now()).await;
        assert!(result.posted);
        assert_eq!(publisher.posts.lock()[0], "template fallback $WIF");
    }

    #[tokio::test]
    async fn duplicate_content_gets_one_varied_retry() {
        let history = temp_history(HistoryConfig::default());
        let now = Utc::now();
        history
            .record_post(&fingerprint("same old $WIF take"), "gem_alpha", "alpha_hunter", "1", now)
            .unwrap();

        let publisher = Arc::new(FakePublisher::new(false));
        let bot = bot(
            FakeMarket { snapshots: vec![gem("SOL")], fail: false },
            None,
            template("same old $WIF take"),
            Arc::clone(&publisher),
            Arc::clone(&history),
        );
        let result = bot.run_cycle(now + chrono::Duration::hours(1)).await;
        assert!(result.posted);
        assert_eq!(publisher.posts.lock()[0], "same old $WIF take take 1");
    }

    #[tokio::test]
    async fn stubborn_duplicate_gives_up() {
        let history = temp_history(HistoryConfig::default());
        let now = Utc::now();
        history
            .record_post(&fingerprint("only one take"), "gem_alpha", "alpha_hunter", "1", now)
            .unwrap();

        let publisher = Arc::new(FakePublisher::new(false));
        let bot = bot(
            FakeMarket { snapshots: vec![gem("SOL")], fail: false },
            None,
            FakeGenerator {
                base: "only one take".to_string(),
                vary: false, // ignores variation
                fail: false,
            },
            Arc::clone(&publisher),
            Arc::clone(&history),
        );
        let result = bot.run_cycle(now + chrono::Duration::hours(1)).await;
        assert_eq!(result.reason, CycleReason::DuplicateContent);
        assert!(publisher.posts.lock().is_empty());
    }

    #[tokio::test]
    async fn rejected_publish_records_nothing() {
        let history = temp_history(HistoryConfig::default());
        let bot = bot(
            FakeMarket { snapshots: vec![gem("WIF")], fail: false },
            None,
            template("rejected $WIF post"),
            Arc::new(FakePublisher::new(true)),
            Arc::clone(&history),
        );
        let now = Utc::now();
        let result = bot.run_cycle(now).await;
        assert_eq!(result.reason, CycleReason::PublishRejected);
        assert_eq!(history.posts_in_window(now), 0);
    }

    #[tokio::test]
    async fn recently_posted_symbols_are_skipped() {
        let history = temp_history(HistoryConfig::default());
        let now = Utc::now();
        history
            .record_post("already covered $wif today", "gem_alpha", "alpha_hunter", "1", now)
            .unwrap();

        let bot = bot(
            FakeMarket { snapshots: vec![gem("WIF")], fail: false },
            None,
            template("anything"),
            Arc::new(FakePublisher::new(false)),
            Arc::clone(&history),
        );
        let result = bot.run_cycle(now + chrono::Duration::hours(1)).await;
        assert_eq!(result.reason, CycleReason::NoCandidates);
    }

    #[tokio::test]
    async fn status_records_cycle_outcomes() {
        let history = temp_history(HistoryConfig::default());
        let status = Arc::new(BotStatus::default());
        let now = Utc::now();
        status.record(now, CycleResult::skipped(CycleReason::NoCandidates));
        let snapshot = status.snapshot(&history, now);
        assert_eq!(snapshot.cycles, 1);
        assert_eq!(snapshot.last_reason, Some(CycleReason::NoCandidates));
        assert!(snapshot.last_success.is_none());
    }
}
