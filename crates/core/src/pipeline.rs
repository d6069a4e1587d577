//! Batch steps run by the worker. Each step walks the active watchlist one ticker at a
//! time; a failure for one ticker is logged, counted and skipped.

use crate::domain::contract::NewWatchlistEntry;
use crate::domain::recommendation::{Recommendation, RecommendationCategory};
use crate::ingest::provider::MarketDataProvider;
use crate::scoring::{score, ScoringConfig};
use crate::storage::news::NewsRecord;
use crate::storage::{earnings, news, prices, recommendations, signals, watchlist};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;

/// Bars requested per ticker by the daily refresh.
pub const DAILY_PRICE_DAYS: u32 = 5;
/// Headlines requested per ticker by the daily refresh.
pub const DAILY_NEWS_LIMIT: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerOutcome {
    pub ticker: String,
    pub recommendation: RecommendationCategory,
    pub confidence: f64,
    pub raw_score: f64,
    pub factors: usize,
    /// Set when the recommendation was scored but could not be stored.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendSummary {
    pub as_of_date: NaiveDate,
    pub tickers: usize,
    pub recorded: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub outcomes: Vec<TickerOutcome>,
}

/// Scores every active watchlist ticker and records the result under `as_of_date`.
///
/// Only reading the watchlist itself is fatal. Unreadable signals count as no signals;
/// a failed estimates lookup or a missing provider counts as no estimates.
pub async fn run_recommendations(
    pool: &SqlitePool,
    provider: Option<&dyn MarketDataProvider>,
    config: &ScoringConfig,
    as_of_date: NaiveDate,
    dry_run: bool,
) -> anyhow::Result<RecommendSummary> {
    let entries = watchlist::list(pool, true).await?;
    let mut outcomes = Vec::with_capacity(entries.len());

    if provider.is_none() {
        tracing::warn!(%as_of_date, "no market data provider; scoring without analyst estimates");
    }

    for entry in &entries {
        let ticker = entry.ticker.as_str();

        let latest = match signals::latest_signals(pool, ticker).await {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(%ticker, error = %err, "loading signals failed; scoring without them");
                Vec::new()
            }
        };

        let estimates = match provider {
            None => None,
            Some(provider) => match provider.analyst_estimates(ticker).await {
                Ok(v) => v,
                Err(err) => {
                    tracing::warn!(
                        %ticker,
                        provider = provider.provider_name(),
                        error = %err,
                        "analyst estimates fetch failed; scoring without them"
                    );
                    None
                }
            },
        };

        let result = score(ticker, &latest, estimates.as_ref(), config);
        let rec = Recommendation::from_result(ticker, as_of_date, &result);

        let error = if dry_run {
            None
        } else {
            match recommendations::record(pool, &rec).await {
                Ok(()) => None,
                Err(err) => {
                    tracing::error!(%ticker, %as_of_date, error = %err, "recording recommendation failed");
                    Some(format!("{err:#}"))
                }
            }
        };

        tracing::info!(
            %ticker,
            %as_of_date,
            recommendation = %rec.recommendation,
            confidence = rec.confidence,
            "scored"
        );

        outcomes.push(TickerOutcome {
            ticker: rec.ticker,
            recommendation: rec.recommendation,
            confidence: rec.confidence,
            raw_score: result.raw_score,
            factors: result.factors.len(),
            error,
        });
    }

    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    let recorded = if dry_run { 0 } else { outcomes.len() - failed };

    Ok(RecommendSummary {
        as_of_date,
        tickers: entries.len(),
        recorded,
        failed,
        dry_run,
        outcomes,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailySummary {
    pub tickers: usize,
    pub price_rows: u64,
    pub news_added: usize,
    pub earnings_dates: usize,
    pub failures: Vec<StepFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFailure {
    pub ticker: String,
    pub step: &'static str,
    pub error: String,
}

/// Refreshes prices, news and the next report date for every active ticker. The three
/// steps are independent: a failed price fetch does not skip that ticker's news.
pub async fn run_daily(
    pool: &SqlitePool,
    provider: &dyn MarketDataProvider,
    as_of_date: NaiveDate,
) -> anyhow::Result<DailySummary> {
    let entries = watchlist::list(pool, true).await?;
    let mut summary = DailySummary {
        tickers: entries.len(),
        ..Default::default()
    };

    for entry in &entries {
        let ticker = entry.ticker.as_str();

        match refresh_prices(pool, provider, ticker).await {
            Ok(n) => summary.price_rows += n,
            Err(err) => summary.fail(ticker, "prices", err),
        }

        match refresh_news(pool, provider, ticker, as_of_date).await {
            Ok(n) => summary.news_added += n,
            Err(err) => summary.fail(ticker, "news", err),
        }

        match refresh_earnings_date(pool, provider, ticker).await {
            Ok(Some(report_date)) => {
                tracing::info!(%ticker, %report_date, "next earnings date");
                summary.earnings_dates += 1;
            }
            Ok(None) => {}
            Err(err) => summary.fail(ticker, "earnings", err),
        }
    }

    tracing::info!(
        %as_of_date,
        tickers = summary.tickers,
        price_rows = summary.price_rows,
        news_added = summary.news_added,
        earnings_dates = summary.earnings_dates,
        failures = summary.failures.len(),
        "daily refresh finished"
    );

    Ok(summary)
}

impl DailySummary {
    fn fail(&mut self, ticker: &str, step: &'static str, err: anyhow::Error) {
        tracing::warn!(%ticker, step, error = %err, "daily refresh step failed");
        self.failures.push(StepFailure {
            ticker: ticker.to_string(),
            step,
            error: format!("{err:#}"),
        });
    }
}

async fn refresh_prices(
    pool: &SqlitePool,
    provider: &dyn MarketDataProvider,
    ticker: &str,
) -> anyhow::Result<u64> {
    let bars = provider.price_history(ticker, DAILY_PRICE_DAYS).await?;
    prices::upsert_prices(pool, ticker, &bars).await
}

async fn refresh_news(
    pool: &SqlitePool,
    provider: &dyn MarketDataProvider,
    ticker: &str,
    as_of_date: NaiveDate,
) -> anyhow::Result<usize> {
    let items = provider.ticker_news(ticker, DAILY_NEWS_LIMIT).await?;
    let mut added = 0;
    for item in items {
        let record = NewsRecord::from_item(ticker, item, as_of_date);
        if news::insert_news(pool, &record).await? {
            added += 1;
        }
    }
    Ok(added)
}

async fn refresh_earnings_date(
    pool: &SqlitePool,
    provider: &dyn MarketDataProvider,
    ticker: &str,
) -> anyhow::Result<Option<NaiveDate>> {
    let Some(report_date) = provider.next_earnings_date(ticker).await? else {
        return Ok(None);
    };
    earnings::record_report_date(pool, ticker, report_date).await?;
    Ok(Some(report_date))
}

/// Fills a missing name or sector from the provider's company info. Lookup failures
/// leave the entry as given.
pub async fn enrich_entry(
    provider: &dyn MarketDataProvider,
    mut entry: NewWatchlistEntry,
) -> NewWatchlistEntry {
    if !entry.name.is_empty() && !entry.sector.is_empty() {
        return entry;
    }

    match provider.current_info(&entry.ticker).await {
        Ok(info) => {
            if entry.name.is_empty() {
                entry.name = info.name.unwrap_or_default();
            }
            if entry.sector.is_empty() {
                entry.sector = info.sector.unwrap_or_default();
            }
        }
        Err(err) => {
            tracing::warn!(ticker = %entry.ticker, error = %err, "company info lookup failed");
        }
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::{Sentiment, SignalObservation};
    use crate::domain::watchlist::Stance;
    use crate::ingest::types::{AnalystEstimates, CompanyInfo, NewsItem, PriceBar};
    use crate::storage::test_pool;
    use crate::storage::watchlist::new_entry;
    use std::collections::{HashMap, HashSet};

    const EPS: f64 = 1e-9;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[derive(Default)]
    struct ScriptedProvider {
        estimates: HashMap<String, AnalystEstimates>,
        prices: HashMap<String, Vec<PriceBar>>,
        news: HashMap<String, Vec<NewsItem>>,
        dates: HashMap<String, NaiveDate>,
        info: HashMap<String, CompanyInfo>,
        failing: HashSet<String>,
    }

    impl ScriptedProvider {
        fn check(&self, ticker: &str) -> anyhow::Result<()> {
            anyhow::ensure!(!self.failing.contains(ticker), "feed unavailable for {ticker}");
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for ScriptedProvider {
        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        async fn current_info(&self, ticker: &str) -> anyhow::Result<CompanyInfo> {
            self.check(ticker)?;
            self.info
                .get(ticker)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unknown ticker {ticker}"))
        }

        async fn analyst_estimates(&self, ticker: &str) -> anyhow::Result<Option<AnalystEstimates>> {
            self.check(ticker)?;
            Ok(self.estimates.get(ticker).cloned())
        }

        async fn next_earnings_date(&self, ticker: &str) -> anyhow::Result<Option<NaiveDate>> {
            self.check(ticker)?;
            Ok(self.dates.get(ticker).copied())
        }

        async fn price_history(&self, ticker: &str, _days: u32) -> anyhow::Result<Vec<PriceBar>> {
            self.check(ticker)?;
            Ok(self.prices.get(ticker).cloned().unwrap_or_default())
        }

        async fn ticker_news(&self, ticker: &str, _limit: u32) -> anyhow::Result<Vec<NewsItem>> {
            self.check(ticker)?;
            Ok(self.news.get(ticker).cloned().unwrap_or_default())
        }
    }

    async fn seed_watchlist(pool: &SqlitePool, tickers: &[&str]) {
        for t in tickers {
            watchlist::add(pool, &new_entry(t, t, Stance::Watch), day(1)).await.unwrap();
        }
    }

    fn signal(ticker: &str, source: &str, score: Option<f64>, sentiment: Option<Sentiment>) -> SignalObservation {
        SignalObservation {
            ticker: ticker.to_string(),
            date: day(14),
            source: source.to_string(),
            score,
            sentiment,
            raw_data: None,
        }
    }

    #[tokio::test]
    async fn recommend_records_every_ticker_and_isolates_provider_failures() {
        let pool = test_pool().await;
        seed_watchlist(&pool, &["NVDA", "AMD", "INTC"]).await;

        signals::insert(&pool, &signal("NVDA", "danelfin", Some(9.0), Some(Sentiment::Bullish)))
            .await
            .unwrap();
        signals::insert(&pool, &signal("AMD", "danelfin", Some(2.0), None)).await.unwrap();

        let mut provider = ScriptedProvider::default();
        provider.estimates.insert(
            "NVDA".to_string(),
            AnalystEstimates {
                recommendation: Some("buy".to_string()),
                earnings_growth: Some(0.25),
                ..Default::default()
            },
        );
        provider.failing.insert("AMD".to_string());

        let summary = run_recommendations(&pool, Some(&provider), &ScoringConfig::default(), day(16), false)
            .await
            .unwrap();
        assert_eq!(summary.tickers, 3);
        assert_eq!(summary.recorded, 3);
        assert_eq!(summary.failed, 0);

        let nvda = recommendations::get(&pool, "NVDA", day(16)).await.unwrap().unwrap();
        assert_eq!(nvda.recommendation, RecommendationCategory::StrongBuy);
        assert!((nvda.confidence - 0.9).abs() < EPS);
        assert_eq!(nvda.factors.len(), 4);
        assert_eq!(nvda.rationale, nvda.factors.join("; "));

        // Estimates failed, the stored signal still counts.
        let amd = recommendations::get(&pool, "AMD", day(16)).await.unwrap().unwrap();
        assert_eq!(amd.recommendation, RecommendationCategory::Sell);
        assert!((amd.confidence - 0.45).abs() < EPS);

        let intc = recommendations::get(&pool, "INTC", day(16)).await.unwrap().unwrap();
        assert_eq!(intc.recommendation, RecommendationCategory::Hold);
        assert_eq!(intc.rationale, "Insufficient data");
        assert!(intc.factors.is_empty());
    }

    #[tokio::test]
    async fn recommend_without_provider_scores_stored_signals() {
        let pool = test_pool().await;
        seed_watchlist(&pool, &["NVDA", "AMD"]).await;
        signals::insert(&pool, &signal("NVDA", "danelfin", Some(9.0), None)).await.unwrap();

        let summary = run_recommendations(&pool, None, &ScoringConfig::default(), day(16), false)
            .await
            .unwrap();
        assert_eq!(summary.recorded, 2);
        assert_eq!(summary.failed, 0);

        let nvda = recommendations::get(&pool, "NVDA", day(16)).await.unwrap().unwrap();
        assert_eq!(nvda.recommendation, RecommendationCategory::Hold);
        assert!((nvda.confidence - 0.45).abs() < EPS);
        assert_eq!(nvda.factors, vec!["Strong Danelfin score (9.0/10)".to_string()]);

        let amd = recommendations::get(&pool, "AMD", day(16)).await.unwrap().unwrap();
        assert_eq!(amd.rationale, "Insufficient data");
    }

    #[tokio::test]
    async fn dry_run_scores_without_writing() {
        let pool = test_pool().await;
        seed_watchlist(&pool, &["NVDA"]).await;

        let summary = run_recommendations(
            &pool,
            Some(&ScriptedProvider::default()),
            &ScoringConfig::default(),
            day(16),
            true,
        )
        .await
        .unwrap();
        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.recorded, 0);
        assert!(recommendations::get(&pool, "NVDA", day(16)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rerun_on_same_day_overwrites() {
        let pool = test_pool().await;
        seed_watchlist(&pool, &["NVDA"]).await;
        let provider = ScriptedProvider::default();
        let config = ScoringConfig::default();

        run_recommendations(&pool, Some(&provider), &config, day(16), false).await.unwrap();
        signals::insert(&pool, &signal("NVDA", "danelfin", Some(8.5), None)).await.unwrap();
        run_recommendations(&pool, Some(&provider), &config, day(16), false).await.unwrap();

        let latest = recommendations::latest_per_ticker(&pool).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].recommendation.recommendation, RecommendationCategory::Buy);
    }

    #[tokio::test]
    async fn daily_refresh_keeps_going_past_failing_ticker() {
        let pool = test_pool().await;
        seed_watchlist(&pool, &["AMD", "NVDA"]).await;

        let mut provider = ScriptedProvider::default();
        provider.failing.insert("AMD".to_string());
        provider.prices.insert(
            "NVDA".to_string(),
            vec![PriceBar {
                date: day(15),
                open: Some(100.0),
                high: Some(105.0),
                low: Some(99.0),
                close: Some(104.0),
                volume: Some(10),
            }],
        );
        provider.news.insert(
            "NVDA".to_string(),
            vec![NewsItem {
                headline: "NVIDIA beats".to_string(),
                url: "https://n/nvda-1".to_string(),
                summary: None,
                source: None,
                published_at: None,
            }],
        );
        provider.dates.insert("NVDA".to_string(), day(20));

        let summary = run_daily(&pool, &provider, day(16)).await.unwrap();
        assert_eq!(summary.tickers, 2);
        assert_eq!(summary.price_rows, 1);
        assert_eq!(summary.news_added, 1);
        assert_eq!(summary.earnings_dates, 1);
        assert_eq!(summary.failures.len(), 3);
        assert!(summary.failures.iter().all(|f| f.ticker == "AMD"));

        let upcoming = earnings::upcoming(&pool, day(16), 7).await.unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].days_until, 4);

        // Second run: the same headline is not counted again.
        let again = run_daily(&pool, &provider, day(16)).await.unwrap();
        assert_eq!(again.news_added, 0);
    }

    #[tokio::test]
    async fn enrich_fills_only_missing_fields() {
        let mut provider = ScriptedProvider::default();
        provider.info.insert(
            "NVDA".to_string(),
            CompanyInfo {
                ticker: "NVDA".to_string(),
                name: Some("NVIDIA Corporation".to_string()),
                sector: Some("Technology".to_string()),
                ..Default::default()
            },
        );

        let entry = NewWatchlistEntry {
            ticker: "NVDA".to_string(),
            name: "Nvidia".to_string(),
            sector: String::new(),
            stance: Stance::Buy,
            notes: String::new(),
        };
        let got = enrich_entry(&provider, entry).await;
        assert_eq!(got.name, "Nvidia");
        assert_eq!(got.sector, "Technology");

        let unknown = NewWatchlistEntry {
            ticker: "ZZZZ".to_string(),
            name: String::new(),
            sector: String::new(),
            stance: Stance::Watch,
            notes: String::new(),
        };
        let got = enrich_entry(&provider, unknown).await;
        assert!(got.name.is_empty());
    }
}
