use crate::domain::contract::NewWatchlistEntry;
use crate::domain::watchlist::{normalize_ticker, Stance, WatchlistEntry};
use anyhow::Context;
use chrono::NaiveDate;
use sqlx::SqlitePool;

#[derive(Debug, sqlx::FromRow)]
struct WatchlistRow {
    ticker: String,
    name: String,
    sector: String,
    stance: String,
    added_date: NaiveDate,
    notes: String,
    active: bool,
}

impl TryFrom<WatchlistRow> for WatchlistEntry {
    type Error = anyhow::Error;

    fn try_from(row: WatchlistRow) -> anyhow::Result<Self> {
        Ok(WatchlistEntry {
            stance: row
                .stance
                .parse::<Stance>()
                .with_context(|| format!("bad stance stored for {}", row.ticker))?,
            ticker: row.ticker,
            name: row.name,
            sector: row.sector,
            added_date: row.added_date,
            notes: row.notes,
            active: row.active,
        })
    }
}

/// Adds or re-activates a ticker. An existing row keeps its original added date and
/// keeps its name/sector when the new values are empty.
pub async fn add(
    pool: &SqlitePool,
    entry: &NewWatchlistEntry,
    added_date: NaiveDate,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO watchlist (ticker, name, sector, stance, added_date, notes, active) \
         VALUES (?, ?, ?, ?, ?, ?, 1) \
         ON CONFLICT (ticker) DO UPDATE SET \
             name = CASE WHEN excluded.name <> '' THEN excluded.name ELSE watchlist.name END, \
             sector = CASE WHEN excluded.sector <> '' THEN excluded.sector ELSE watchlist.sector END, \
             stance = excluded.stance, \
             notes = excluded.notes, \
             active = 1",
    )
    .bind(normalize_ticker(&entry.ticker))
    .bind(&entry.name)
    .bind(&entry.sector)
    .bind(entry.stance.as_str())
    .bind(added_date)
    .bind(&entry.notes)
    .execute(pool)
    .await
    .context("upsert watchlist failed")?;
    Ok(())
}

/// Soft delete. Returns false if the ticker was never added.
pub async fn remove(pool: &SqlitePool, ticker: &str) -> anyhow::Result<bool> {
    let res = sqlx::query("UPDATE watchlist SET active = 0 WHERE ticker = ?")
        .bind(normalize_ticker(ticker))
        .execute(pool)
        .await
        .context("deactivate watchlist entry failed")?;
    Ok(res.rows_affected() > 0)
}

pub async fn update_stance(pool: &SqlitePool, ticker: &str, stance: Stance) -> anyhow::Result<bool> {
    let res = sqlx::query("UPDATE watchlist SET stance = ? WHERE ticker = ?")
        .bind(stance.as_str())
        .bind(normalize_ticker(ticker))
        .execute(pool)
        .await
        .context("update watchlist stance failed")?;
    Ok(res.rows_affected() > 0)
}

pub async fn get(pool: &SqlitePool, ticker: &str) -> anyhow::Result<Option<WatchlistEntry>> {
    let row = sqlx::query_as::<_, WatchlistRow>(
        "SELECT ticker, name, sector, stance, added_date, notes, active \
         FROM watchlist WHERE ticker = ?",
    )
    .bind(normalize_ticker(ticker))
    .fetch_optional(pool)
    .await
    .context("select watchlist entry failed")?;

    row.map(WatchlistEntry::try_from).transpose()
}

pub async fn list(pool: &SqlitePool, active_only: bool) -> anyhow::Result<Vec<WatchlistEntry>> {
    let sql = if active_only {
        "SELECT ticker, name, sector, stance, added_date, notes, active \
         FROM watchlist WHERE active = 1 ORDER BY ticker"
    } else {
        "SELECT ticker, name, sector, stance, added_date, notes, active \
         FROM watchlist ORDER BY ticker"
    };

    let rows = sqlx::query_as::<_, WatchlistRow>(sql)
        .fetch_all(pool)
        .await
        .context("select watchlist failed")?;

    rows.into_iter().map(WatchlistEntry::try_from).collect()
}

#[cfg(test)]
pub(crate) fn new_entry(ticker: &str, name: &str, stance: Stance) -> NewWatchlistEntry {
    NewWatchlistEntry {
        ticker: ticker.to_string(),
        name: name.to_string(),
        sector: String::new(),
        stance,
        notes: String::new(),
    }
}
