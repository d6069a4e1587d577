use crate::domain::trade::{NewTrade, Trade, TradeAction};
use crate::domain::watchlist::normalize_ticker;
use crate::storage::signals;
use anyhow::Context;
use chrono::NaiveDate;
use sqlx::SqlitePool;

#[derive(Debug, sqlx::FromRow)]
struct TradeRow {
    id: i64,
    ticker: String,
    action: String,
    date: NaiveDate,
    price: f64,
    shares: i64,
    thesis: Option<String>,
    signals_snapshot: Option<String>,
    outcome_notes: Option<String>,
    outcome_return: Option<f64>,
    closed_date: Option<NaiveDate>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = anyhow::Error;

    fn try_from(row: TradeRow) -> anyhow::Result<Self> {
        let action = row
            .action
            .parse::<TradeAction>()
            .with_context(|| format!("bad action stored for trade {}", row.id))?;
        let signals_snapshot = row
            .signals_snapshot
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .with_context(|| format!("bad signals snapshot stored for trade {}", row.id))?;

        Ok(Trade {
            id: row.id,
            ticker: row.ticker,
            action,
            date: row.date,
            price: row.price,
            shares: row.shares,
            thesis: row.thesis,
            signals_snapshot,
            outcome_notes: row.outcome_notes,
            outcome_return: row.outcome_return,
            closed_date: row.closed_date,
        })
    }
}

const TRADE_COLUMNS: &str = "id, ticker, action, date, price, shares, thesis, signals_snapshot, \
                             outcome_notes, outcome_return, closed_date";

/// Journals a trade together with a copy of the ticker's latest signals. Returns the id.
pub async fn log_trade(pool: &SqlitePool, trade: &NewTrade) -> anyhow::Result<i64> {
    let ticker = normalize_ticker(&trade.ticker);

    let snapshot = signals::latest_signals(pool, &ticker).await?;
    let snapshot = if snapshot.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&snapshot).context("serialize signals snapshot failed")?)
    };

    let res = sqlx::query(
        "INSERT INTO trades (ticker, action, date, price, shares, thesis, signals_snapshot) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&ticker)
    .bind(trade.action.as_str())
    .bind(trade.date)
    .bind(trade.price)
    .bind(trade.shares)
    .bind(&trade.thesis)
    .bind(snapshot)
    .execute(pool)
    .await
    .context("insert trades failed")?;

    Ok(res.last_insert_rowid())
}

/// Closes an open trade. Returns false when the trade does not exist or is already closed.
pub async fn close_trade(
    pool: &SqlitePool,
    id: i64,
    outcome_notes: &str,
    outcome_return: f64,
    closed_date: NaiveDate,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        "UPDATE trades SET outcome_notes = ?, outcome_return = ?, closed_date = ? \
         WHERE id = ? AND closed_date IS NULL",
    )
    .bind(outcome_notes)
    .bind(outcome_return)
    .bind(closed_date)
    .bind(id)
    .execute(pool)
    .await
    .with_context(|| format!("close trade {id} failed"))?;
    Ok(res.rows_affected() > 0)
}

pub async fn get(pool: &SqlitePool, id: i64) -> anyhow::Result<Option<Trade>> {
    let row = sqlx::query_as::<_, TradeRow>(&format!("SELECT {TRADE_COLUMNS} FROM trades WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("select trade failed")?;
    row.map(Trade::try_from).transpose()
}

pub async fn open_trades(pool: &SqlitePool) -> anyhow::Result<Vec<Trade>> {
    let rows = sqlx::query_as::<_, TradeRow>(&format!(
        "SELECT {TRADE_COLUMNS} FROM trades WHERE closed_date IS NULL ORDER BY date DESC, id DESC"
    ))
    .fetch_all(pool)
    .await
    .context("select open trades failed")?;
    rows.into_iter().map(Trade::try_from).collect()
}

pub async fn history(
    pool: &SqlitePool,
    ticker: Option<&str>,
    limit: u32,
) -> anyhow::Result<Vec<Trade>> {
    let rows = match ticker {
        Some(t) => {
            sqlx::query_as::<_, TradeRow>(&format!(
                "SELECT {TRADE_COLUMNS} FROM trades WHERE ticker = ? \
                 ORDER BY date DESC, id DESC LIMIT ?"
            ))
            .bind(normalize_ticker(t))
            .bind(i64::from(limit))
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, TradeRow>(&format!(
                "SELECT {TRADE_COLUMNS} FROM trades ORDER BY date DESC, id DESC LIMIT ?"
            ))
            .bind(i64::from(limit))
            .fetch_all(pool)
            .await
        }
    }
    .context("select trade history failed")?;

    rows.into_iter().map(Trade::try_from).collect()
}
