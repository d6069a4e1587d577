use anyhow::Context;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use sqlx::SqlitePool;
use std::path::Path;
use trader_core::domain::contract::{SignalImport, TradeImport, WatchlistImport};
use trader_core::ingest::provider::MarketDataProvider;
use trader_core::storage::{signals, trades, watchlist};

/// Reads a JSON array of records from `path`.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_records(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn parse_records<T: DeserializeOwned>(text: &str) -> anyhow::Result<Vec<T>> {
    serde_json::from_str::<Vec<T>>(text).context("expected a JSON array of records")
}

/// Validates every record before any is written. Fails listing each bad record by index.
fn validate_all<T, U>(
    records: Vec<T>,
    mut validate: impl FnMut(T) -> anyhow::Result<U>,
) -> anyhow::Result<Vec<U>> {
    let mut out = Vec::with_capacity(records.len());
    let mut errors = Vec::new();

    for (i, record) in records.into_iter().enumerate() {
        match validate(record) {
            Ok(v) => out.push(v),
            Err(err) => errors.push(format!("record {i}: {err:#}")),
        }
    }

    anyhow::ensure!(
        errors.is_empty(),
        "{} invalid record(s):\n{}",
        errors.len(),
        errors.join("\n")
    );
    Ok(out)
}

pub async fn import_watchlist(
    pool: &SqlitePool,
    provider: Option<&dyn MarketDataProvider>,
    records: Vec<WatchlistImport>,
    today: NaiveDate,
    dry_run: bool,
) -> anyhow::Result<usize> {
    let entries = validate_all(records, WatchlistImport::validate_and_into_entry)?;
    if dry_run {
        return Ok(entries.len());
    }

    let mut written = 0;
    for entry in entries {
        let entry = match provider {
            Some(p) => trader_core::pipeline::enrich_entry(p, entry).await,
            None => entry,
        };
        watchlist::add(pool, &entry, today).await?;
        tracing::info!(ticker = %entry.ticker, stance = %entry.stance, "watchlist entry saved");
        written += 1;
    }
    Ok(written)
}

pub async fn import_signals(
    pool: &SqlitePool,
    records: Vec<SignalImport>,
    today: NaiveDate,
    dry_run: bool,
) -> anyhow::Result<usize> {
    let observations = validate_all(records, |r| r.validate_and_into_observation(today))?;
    if dry_run {
        return Ok(observations.len());
    }

    for obs in &observations {
        signals::insert(pool, obs).await?;
    }
    Ok(observations.len())
}

pub async fn import_trades(
    pool: &SqlitePool,
    records: Vec<TradeImport>,
    today: NaiveDate,
    dry_run: bool,
) -> anyhow::Result<Vec<i64>> {
    let new_trades = validate_all(records, |r| r.validate_and_into_trade(today))?;
    if dry_run {
        return Ok(Vec::new());
    }

    let mut ids = Vec::with_capacity(new_trades.len());
    for trade in &new_trades {
        let id = trades::log_trade(pool, trade).await?;
        tracing::info!(trade_id = id, ticker = %trade.ticker, action = %trade.action, "trade logged");
        ids.push(id);
    }
    Ok(ids)
}
