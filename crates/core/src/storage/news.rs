use crate::domain::signal::Sentiment;
use crate::domain::watchlist::normalize_ticker;
use crate::ingest::types::NewsItem;
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// A stored headline. `ticker` is absent for market-wide news.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub ticker: Option<String>,
    pub date: NaiveDate,
    pub headline: String,
    pub summary: Option<String>,
    pub source: Option<String>,
    pub url: String,
    pub sentiment: Option<Sentiment>,
    pub relevance_score: Option<f64>,
}

impl NewsRecord {
    /// Dates the item by its publish time, falling back to `fetched_on`.
    pub fn from_item(ticker: &str, item: NewsItem, fetched_on: NaiveDate) -> Self {
        NewsRecord {
            ticker: Some(normalize_ticker(ticker)),
            date: item.published_at.map(|t| t.date_naive()).unwrap_or(fetched_on),
            headline: item.headline,
            summary: item.summary,
            source: item.source,
            url: item.url,
            sentiment: None,
            relevance_score: None,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NewsRow {
    ticker: Option<String>,
    date: NaiveDate,
    headline: String,
    summary: Option<String>,
    source: Option<String>,
    url: String,
    sentiment: Option<String>,
    relevance_score: Option<f64>,
}

impl TryFrom<NewsRow> for NewsRecord {
    type Error = anyhow::Error;

    fn try_from(row: NewsRow) -> anyhow::Result<Self> {
        let sentiment = row
            .sentiment
            .as_deref()
            .map(str::parse::<Sentiment>)
            .transpose()
            .with_context(|| format!("bad sentiment stored for {}", row.url))?;
        Ok(NewsRecord {
            ticker: row.ticker,
            date: row.date,
            headline: row.headline,
            summary: row.summary,
            source: row.source,
            url: row.url,
            sentiment,
            relevance_score: row.relevance_score,
        })
    }
}

/// Inserts a headline unless its URL is already stored. Returns whether a row was added.
pub async fn insert_news(pool: &SqlitePool, news: &NewsRecord) -> anyhow::Result<bool> {
    let res = sqlx::query(
        "INSERT INTO news (ticker, date, headline, summary, source, url, sentiment, relevance_score) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (url) DO NOTHING",
    )
    .bind(news.ticker.as_deref().map(normalize_ticker))
    .bind(news.date)
    .bind(&news.headline)
    .bind(&news.summary)
    .bind(&news.source)
    .bind(&news.url)
    .bind(news.sentiment.map(Sentiment::as_str))
    .bind(news.relevance_score)
    .execute(pool)
    .await
    .context("insert news failed")?;
    Ok(res.rows_affected() > 0)
}

/// Headlines dated on or after `since`, newest first.
pub async fn recent_news(
    pool: &SqlitePool,
    ticker: Option<&str>,
    since: NaiveDate,
) -> anyhow::Result<Vec<NewsRecord>> {
    let rows = match ticker {
        Some(t) => {
            sqlx::query_as::<_, NewsRow>(
                "SELECT ticker, date, headline, summary, source, url, sentiment, relevance_score \
                 FROM news WHERE ticker = ? AND date >= ? ORDER BY date DESC, id DESC",
            )
            .bind(normalize_ticker(t))
            .bind(since)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, NewsRow>(
                "SELECT ticker, date, headline, summary, source, url, sentiment, relevance_score \
                 FROM news WHERE date >= ? ORDER BY date DESC, id DESC",
            )
            .bind(since)
            .fetch_all(pool)
            .await
        }
    }
    .context("select news failed")?;

    rows.into_iter().map(NewsRecord::try_from).collect()
}
