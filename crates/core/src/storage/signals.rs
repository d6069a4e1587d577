use crate::domain::signal::{Sentiment, SignalObservation};
use crate::domain::watchlist::normalize_ticker;
use crate::scoring::resolve_latest;
use anyhow::Context;
use chrono::NaiveDate;
use sqlx::SqlitePool;

#[derive(Debug, sqlx::FromRow)]
struct SignalRow {
    ticker: String,
    date: NaiveDate,
    source: String,
    score: Option<f64>,
    sentiment: Option<String>,
    raw_data: Option<String>,
}

impl TryFrom<SignalRow> for SignalObservation {
    type Error = anyhow::Error;

    fn try_from(row: SignalRow) -> anyhow::Result<Self> {
        let sentiment = row
            .sentiment
            .as_deref()
            .map(str::parse::<Sentiment>)
            .transpose()
            .with_context(|| format!("bad sentiment stored for {} / {}", row.ticker, row.source))?;

        // Payloads are opaque; a non-JSON payload is kept as a string.
        let raw_data = row.raw_data.map(|s| {
            serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s))
        });

        Ok(SignalObservation {
            ticker: row.ticker,
            date: row.date,
            source: row.source,
            score: row.score,
            sentiment,
            raw_data,
        })
    }
}

/// Upserts on `(ticker, date, source)`; the last write wins.
pub async fn insert(pool: &SqlitePool, obs: &SignalObservation) -> anyhow::Result<()> {
    let raw_data = obs
        .raw_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("serialize signal raw_data failed")?;

    sqlx::query(
        "INSERT INTO signals (ticker, date, source, score, sentiment, raw_data) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT (ticker, date, source) DO UPDATE SET \
             score = excluded.score, \
             sentiment = excluded.sentiment, \
             raw_data = excluded.raw_data",
    )
    .bind(normalize_ticker(&obs.ticker))
    .bind(obs.date)
    .bind(&obs.source)
    .bind(obs.score)
    .bind(obs.sentiment.map(Sentiment::as_str))
    .bind(raw_data)
    .execute(pool)
    .await
    .context("upsert signals failed")?;
    Ok(())
}

/// All observations for a ticker, oldest first.
pub async fn history(pool: &SqlitePool, ticker: &str) -> anyhow::Result<Vec<SignalObservation>> {
    let rows = sqlx::query_as::<_, SignalRow>(
        "SELECT ticker, date, source, score, sentiment, raw_data \
         FROM signals WHERE ticker = ? \
         ORDER BY date ASC, source ASC",
    )
    .bind(normalize_ticker(ticker))
    .fetch_all(pool)
    .await
    .context("select signals failed")?;

    rows.into_iter().map(SignalObservation::try_from).collect()
}

/// The most recent observation from each source for `ticker`.
pub async fn latest_signals(
    pool: &SqlitePool,
    ticker: &str,
) -> anyhow::Result<Vec<SignalObservation>> {
    Ok(resolve_latest(history(pool, ticker).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_pool;
    use serde_json::json;

    fn obs(source: &str, day: u32, score: Option<f64>, sentiment: Option<Sentiment>) -> SignalObservation {
        SignalObservation {
            ticker: "nvda".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            source: source.to_string(),
            score,
            sentiment,
            raw_data: None,
        }
    }

    #[tokio::test]
    async fn same_key_overwrites_in_place() {
        let pool = test_pool().await;
        insert(&pool, &obs("danelfin", 1, Some(4.0), None)).await.unwrap();
        insert(&pool, &obs("danelfin", 1, Some(9.0), Some(Sentiment::Bullish))).await.unwrap();

        let rows = history(&pool, "NVDA").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score, Some(9.0));
        assert_eq!(rows[0].sentiment, Some(Sentiment::Bullish));
    }

    #[tokio::test]
    async fn latest_returns_one_row_per_source() {
        let pool = test_pool().await;
        for (day, score) in [(1, 3.0), (4, 5.0), (2, 4.0), (8, 7.5), (6, 6.0)] {
            insert(&pool, &obs("danelfin", day, Some(score), None)).await.unwrap();
        }
        insert(&pool, &obs("toggle", 3, None, Some(Sentiment::Bearish))).await.unwrap();

        let latest = latest_signals(&pool, "nvda").await.unwrap();
        assert_eq!(latest.len(), 2);

        let danelfin = latest.iter().find(|s| s.source == "danelfin").unwrap();
        assert_eq!(danelfin.date, NaiveDate::from_ymd_opt(2026, 10, 8).unwrap());
        assert_eq!(danelfin.score, Some(7.5));

        let toggle = latest.iter().find(|s| s.source == "toggle").unwrap();
        assert_eq!(toggle.sentiment, Some(Sentiment::Bearish));
    }

    #[tokio::test]
    async fn latest_is_scoped_to_ticker() {
        let pool = test_pool().await;
        insert(&pool, &obs("danelfin", 1, Some(8.0), None)).await.unwrap();
        assert!(latest_signals(&pool, "AMD").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn raw_payload_round_trips() {
        let pool = test_pool().await;
        let mut o = obs("danelfin", 2, Some(7.0), None);
        o.raw_data = Some(json!({"fundamental": 6, "technical": 8}));
        insert(&pool, &o).await.unwrap();

        let got = history(&pool, "NVDA").await.unwrap();
        assert_eq!(got[0].raw_data, Some(json!({"fundamental": 6, "technical": 8})));
    }
}
