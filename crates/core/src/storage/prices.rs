use crate::domain::watchlist::normalize_ticker;
use crate::ingest::types::PriceBar;
use anyhow::Context;
use chrono::NaiveDate;
use sqlx::SqlitePool;

#[derive(Debug, sqlx::FromRow)]
struct PriceRow {
    date: NaiveDate,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<i64>,
}

impl From<PriceRow> for PriceBar {
    fn from(row: PriceRow) -> Self {
        PriceBar {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }
    }
}

/// Upserts daily bars for one ticker inside a single transaction. Returns rows written.
pub async fn upsert_prices(
    pool: &SqlitePool,
    ticker: &str,
    bars: &[PriceBar],
) -> anyhow::Result<u64> {
    if bars.is_empty() {
        return Ok(0);
    }
    let ticker = normalize_ticker(ticker);

    let mut tx = pool.begin().await.context("begin transaction failed")?;
    let mut written = 0u64;

    for bar in bars {
        let res = sqlx::query(
            "INSERT INTO prices (ticker, date, open, high, low, close, volume) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (ticker, date) DO UPDATE SET \
                 open = excluded.open, \
                 high = excluded.high, \
                 low = excluded.low, \
                 close = excluded.close, \
                 volume = excluded.volume",
        )
        .bind(&ticker)
        .bind(bar.date)
        .bind(bar.open)
        .bind(bar.high)
        .bind(bar.low)
        .bind(bar.close)
        .bind(bar.volume)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upsert prices failed for {ticker} {}", bar.date))?;
        written += res.rows_affected();
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(written)
}

pub async fn latest_price(pool: &SqlitePool, ticker: &str) -> anyhow::Result<Option<PriceBar>> {
    let row = sqlx::query_as::<_, PriceRow>(
        "SELECT date, open, high, low, close, volume FROM prices \
         WHERE ticker = ? ORDER BY date DESC LIMIT 1",
    )
    .bind(normalize_ticker(ticker))
    .fetch_optional(pool)
    .await
    .context("select latest price failed")?;
    Ok(row.map(PriceBar::from))
}

/// Most recent `limit` bars, returned oldest first.
pub async fn price_history(
    pool: &SqlitePool,
    ticker: &str,
    limit: u32,
) -> anyhow::Result<Vec<PriceBar>> {
    let rows = sqlx::query_as::<_, PriceRow>(
        "SELECT date, open, high, low, close, volume FROM prices \
         WHERE ticker = ? ORDER BY date DESC LIMIT ?",
    )
    .bind(normalize_ticker(ticker))
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await
    .context("select price history failed")?;

    let mut bars: Vec<PriceBar> = rows.into_iter().map(PriceBar::from).collect();
    bars.reverse();
    Ok(bars)
}
