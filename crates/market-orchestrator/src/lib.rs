use dashmap::DashMap;
use market_core::{CoinAnalysis, CoinSummary, MarketChart, MarketDataSource, MarketError};
use prediction_engine::PredictionEngine;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod cache;

use cache::{Clock, Lookup, SystemClock, TtlCache, CACHE_TTL_SECS};

/// Single slot for the top-100 listing.
const LIST_CACHE_KEY: &str = "coins:markets";

/// Analysis always looks back 90 days, whatever window the caller asked
/// other endpoints for.
const ANALYSIS_LOOKBACK_DAYS: u32 = 90;

const ANALYSIS_CONFIDENCE: &str = "Based on 90-day Random Forest Analysis";
const ANALYSIS_DISCLAIMER: &str = "Analytical insights for educational purposes only.";

/// Owns the upstream source, both caches, and the prediction engine, and
/// applies the fetch policy: fresh hits short-circuit, misses and stale
/// entries refresh under a per-key lock, and a rate-limited refresh falls
/// back to whatever usable entry is already cached.
pub struct MarketOrchestrator {
    source: Arc<dyn MarketDataSource>,
    engine: PredictionEngine,
    series_cache: TtlCache<MarketChart>,
    list_cache: TtlCache<Vec<CoinSummary>>,
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MarketOrchestrator {
    pub fn new(source: Arc<dyn MarketDataSource>, engine: PredictionEngine) -> Self {
        Self::with_clock(source, engine, CACHE_TTL_SECS, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn MarketDataSource>,
        engine: PredictionEngine,
        ttl_secs: i64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            engine,
            series_cache: TtlCache::new(ttl_secs, clock.clone()),
            list_cache: TtlCache::new(ttl_secs, clock),
            refresh_locks: DashMap::new(),
        }
    }

    /// Top-100 coin listing (cached, one global slot). An empty stored
    /// list never satisfies a hit or a rate-limit fallback.
    pub async fn get_coin_list(&self) -> Result<Vec<CoinSummary>, MarketError> {
        if let Lookup::Fresh(coins) = self.list_cache.get(LIST_CACHE_KEY) {
            if !coins.is_empty() {
                tracing::debug!("serving coin list from cache");
                return Ok(coins);
            }
        }

        let lock = self.refresh_lock(LIST_CACHE_KEY);
        let _guard = lock.lock().await;

        // Another request may have refreshed while we waited on the lock.
        if let Lookup::Fresh(coins) = self.list_cache.get(LIST_CACHE_KEY) {
            if !coins.is_empty() {
                return Ok(coins);
            }
        }

        match self.source.fetch_markets().await {
            Ok(coins) => {
                self.list_cache.put(LIST_CACHE_KEY, coins.clone());
                Ok(coins)
            }
            Err(MarketError::RateLimited) => match self.list_cache.get(LIST_CACHE_KEY) {
                Lookup::Fresh(coins) | Lookup::Stale(coins) if !coins.is_empty() => {
                    tracing::warn!("rate limited upstream; serving stale coin list");
                    Ok(coins)
                }
                _ => Err(MarketError::RateLimited),
            },
            Err(other) => Err(other),
        }
    }

    /// Daily price series for one coin (cached per coin and window).
    pub async fn get_market_series(
        &self,
        coin_id: &str,
        days: u32,
    ) -> Result<MarketChart, MarketError> {
        let key = format!("{}:{}", coin_id, days);

        if let Lookup::Fresh(chart) = self.series_cache.get(&key) {
            tracing::debug!("serving market series for {} from cache", coin_id);
            return Ok(chart);
        }

        let lock = self.refresh_lock(&key);
        let _guard = lock.lock().await;

        if let Lookup::Fresh(chart) = self.series_cache.get(&key) {
            return Ok(chart);
        }

        match self.source.fetch_market_chart(coin_id, days).await {
            Ok(chart) => {
                self.series_cache.put(&key, chart.clone());
                Ok(chart)
            }
            Err(MarketError::RateLimited) => match self.series_cache.get(&key) {
                // Not-found and other upstream failures surface below even
                // when an entry exists; only rate limiting falls back.
                Lookup::Fresh(chart) | Lookup::Stale(chart) => {
                    tracing::warn!("rate limited upstream; serving stale series for {}", coin_id);
                    Ok(chart)
                }
                Lookup::Miss => Err(MarketError::RateLimited),
            },
            Err(other) => Err(other),
        }
    }

    /// Full analysis: fetch 90 days of history, derive features, retrain
    /// the classifier from scratch, and label the most recent row.
    pub async fn analyze_coin(&self, coin_id: &str) -> Result<CoinAnalysis, MarketError> {
        let chart = self
            .get_market_series(coin_id, ANALYSIS_LOOKBACK_DAYS)
            .await?;

        let current_price = chart.latest_price().ok_or_else(|| {
            MarketError::InsufficientData(format!("no price history for {}", coin_id))
        })?;

        let rows = feature_pipeline::derive_features(&chart);
        if rows.is_empty() {
            return Err(MarketError::InsufficientData(format!(
                "{} has too few observations to derive features",
                coin_id
            )));
        }

        self.engine.train(&rows)?;

        let latest = &rows[rows.len() - 1];
        let prediction = self.engine.predict(latest)?;

        Ok(CoinAnalysis {
            coin: coin_id.to_string(),
            current_price: (current_price * 100.0).round() / 100.0,
            prediction,
            confidence: ANALYSIS_CONFIDENCE.to_string(),
            disclaimer: ANALYSIS_DISCLAIMER.to_string(),
        })
    }

    /// At most one refresh in flight per cache key.
    fn refresh_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::cache::test_clock::ManualClock;
    use super::*;
    use async_trait::async_trait;
    use market_core::{Direction, PricePoint};
    use prediction_engine::ModelStore;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Upstream double that replays a script of responses and counts calls.
    #[derive(Default)]
    struct ScriptedSource {
        chart_script: StdMutex<VecDeque<Result<MarketChart, MarketError>>>,
        markets_script: StdMutex<VecDeque<Result<Vec<CoinSummary>, MarketError>>>,
        chart_calls: AtomicUsize,
        markets_calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn push_chart(&self, result: Result<MarketChart, MarketError>) {
            self.chart_script.lock().unwrap().push_back(result);
        }

        fn push_markets(&self, result: Result<Vec<CoinSummary>, MarketError>) {
            self.markets_script.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl MarketDataSource for ScriptedSource {
        async fn fetch_markets(&self) -> Result<Vec<CoinSummary>, MarketError> {
            self.markets_calls.fetch_add(1, Ordering::SeqCst);
            self.markets_script
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected fetch_markets call")
        }

        async fn fetch_market_chart(
            &self,
            _coin_id: &str,
            _days: u32,
        ) -> Result<MarketChart, MarketError> {
            self.chart_calls.fetch_add(1, Ordering::SeqCst);
            self.chart_script
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected fetch_market_chart call")
        }
    }

    fn chart_of(prices: &[f64]) -> MarketChart {
        MarketChart {
            prices: prices
                .iter()
                .enumerate()
                .map(|(i, &price)| PricePoint {
                    timestamp: 1_700_000_000_000 + i as i64 * 86_400_000,
                    price,
                })
                .collect(),
        }
    }

    fn wavy_prices(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64 * 0.8).sin() * 5.0 + i as f64 * 0.1)
            .collect()
    }

    fn coin(id: &str) -> CoinSummary {
        CoinSummary {
            id: id.to_string(),
            symbol: id[..3.min(id.len())].to_string(),
            name: id.to_string(),
            image: None,
            current_price: Some(1.0),
            market_cap: Some(1000.0),
            market_cap_rank: Some(1),
            price_change_percentage_24h: None,
            total_volume: None,
        }
    }

    struct Harness {
        source: Arc<ScriptedSource>,
        clock: Arc<ManualClock>,
        orchestrator: MarketOrchestrator,
        _model_dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let source = Arc::new(ScriptedSource::default());
        let clock = Arc::new(ManualClock::starting_at(chrono::Utc::now()));
        let model_dir = tempfile::tempdir().unwrap();
        let engine =
            PredictionEngine::new(ModelStore::new(model_dir.path().join("model.json")));

        let orchestrator =
            MarketOrchestrator::with_clock(source.clone(), engine, CACHE_TTL_SECS, clock.clone());

        Harness {
            source,
            clock,
            orchestrator,
            _model_dir: model_dir,
        }
    }

    #[tokio::test]
    async fn test_fresh_series_hit_skips_upstream() {
        let h = harness();
        h.source.push_chart(Ok(chart_of(&[1.0, 2.0, 3.0])));

        let first = h.orchestrator.get_market_series("bitcoin", 30).await.unwrap();
        let second = h.orchestrator.get_market_series("bitcoin", 30).await.unwrap();

        assert_eq!(h.source.chart_calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.prices, second.prices);
    }

    #[tokio::test]
    async fn test_stale_series_refetches() {
        let h = harness();
        h.source.push_chart(Ok(chart_of(&[1.0])));
        h.source.push_chart(Ok(chart_of(&[2.0])));

        h.orchestrator.get_market_series("bitcoin", 30).await.unwrap();
        h.clock.advance_secs(CACHE_TTL_SECS + 1);
        let refreshed = h.orchestrator.get_market_series("bitcoin", 30).await.unwrap();

        assert_eq!(h.source.chart_calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshed.prices[0].price, 2.0);
    }

    #[tokio::test]
    async fn test_rate_limited_serves_stale_series() {
        let h = harness();
        h.source.push_chart(Ok(chart_of(&[42.0])));
        h.source.push_chart(Err(MarketError::RateLimited));

        h.orchestrator.get_market_series("bitcoin", 30).await.unwrap();
        h.clock.advance_secs(CACHE_TTL_SECS + 1);
        let fallback = h.orchestrator.get_market_series("bitcoin", 30).await.unwrap();

        assert_eq!(fallback.prices[0].price, 42.0);
    }

    #[tokio::test]
    async fn test_rate_limited_without_entry_surfaces() {
        let h = harness();
        h.source.push_chart(Err(MarketError::RateLimited));

        let err = h.orchestrator.get_market_series("bitcoin", 30).await.unwrap_err();
        assert!(matches!(err, MarketError::RateLimited));
    }

    #[tokio::test]
    async fn test_not_found_never_falls_back_to_cache() {
        let h = harness();
        h.source.push_chart(Ok(chart_of(&[42.0])));
        h.source.push_chart(Err(MarketError::NotFound("dogecoin".to_string())));

        h.orchestrator.get_market_series("dogecoin", 30).await.unwrap();
        h.clock.advance_secs(CACHE_TTL_SECS + 1);
        let err = h.orchestrator.get_market_series("dogecoin", 30).await.unwrap_err();

        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_other_upstream_error_surfaces_with_status() {
        let h = harness();
        h.source.push_chart(Err(MarketError::UpstreamStatus { status: 500 }));

        let err = h.orchestrator.get_market_series("bitcoin", 30).await.unwrap_err();
        assert!(matches!(err, MarketError::UpstreamStatus { status: 500 }));
    }

    #[tokio::test]
    async fn test_fresh_list_hit_skips_upstream() {
        let h = harness();
        h.source.push_markets(Ok(vec![coin("bitcoin"), coin("ethereum")]));

        let first = h.orchestrator.get_coin_list().await.unwrap();
        let second = h.orchestrator.get_coin_list().await.unwrap();

        assert_eq!(h.source.markets_calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_rate_limited_list_serves_stale() {
        let h = harness();
        h.source.push_markets(Ok(vec![coin("bitcoin")]));
        h.source.push_markets(Err(MarketError::RateLimited));

        h.orchestrator.get_coin_list().await.unwrap();
        h.clock.advance_secs(CACHE_TTL_SECS + 1);
        let fallback = h.orchestrator.get_coin_list().await.unwrap();

        assert_eq!(fallback[0].id, "bitcoin");
    }

    #[tokio::test]
    async fn test_empty_cached_list_is_not_a_usable_fallback() {
        let h = harness();
        h.source.push_markets(Ok(Vec::new()));
        h.source.push_markets(Err(MarketError::RateLimited));

        let empty = h.orchestrator.get_coin_list().await.unwrap();
        assert!(empty.is_empty());

        // Still within the TTL, but an empty slot counts as no entry: the
        // next call refetches and the rate limit surfaces.
        let err = h.orchestrator.get_coin_list().await.unwrap_err();
        assert!(matches!(err, MarketError::RateLimited));
        assert_eq!(h.source.markets_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_analyze_coin_happy_path() {
        let h = harness();
        let prices = wavy_prices(90);
        h.source.push_chart(Ok(chart_of(&prices)));

        let analysis = h.orchestrator.analyze_coin("bitcoin").await.unwrap();

        assert_eq!(analysis.coin, "bitcoin");
        assert!(matches!(
            analysis.prediction,
            Direction::Rise | Direction::FallOrStable
        ));
        let expected_price = (prices[prices.len() - 1] * 100.0).round() / 100.0;
        assert_eq!(analysis.current_price, expected_price);
        assert_eq!(analysis.confidence, "Based on 90-day Random Forest Analysis");
    }

    #[tokio::test]
    async fn test_analyze_coin_is_deterministic() {
        let h = harness();
        let prices = wavy_prices(90);
        h.source.push_chart(Ok(chart_of(&prices)));

        let first = h.orchestrator.analyze_coin("bitcoin").await.unwrap();
        // Second run is served from cache and retrains on identical rows.
        let second = h.orchestrator.analyze_coin("bitcoin").await.unwrap();

        assert_eq!(first.prediction, second.prediction);
        assert_eq!(h.source.chart_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_analyze_coin_with_short_series_is_insufficient_data() {
        let h = harness();
        h.source.push_chart(Ok(chart_of(&[1.0, 2.0, 3.0, 4.0, 5.0])));

        let err = h.orchestrator.analyze_coin("bitcoin").await.unwrap_err();
        assert!(matches!(err, MarketError::InsufficientData(_)));
    }

    #[tokio::test]
    async fn test_analyze_coin_with_empty_series_is_insufficient_data() {
        let h = harness();
        h.source.push_chart(Ok(MarketChart::default()));

        let err = h.orchestrator.analyze_coin("bitcoin").await.unwrap_err();
        assert!(matches!(err, MarketError::InsufficientData(_)));
    }
}
