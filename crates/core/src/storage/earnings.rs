use crate::domain::earnings::{surprise_pct, CalendarEntry, EarningsEvent};
use crate::domain::watchlist::{normalize_ticker, Stance};
use anyhow::Context;
use chrono::{Duration, NaiveDate};
use sqlx::SqlitePool;

#[derive(Debug, sqlx::FromRow)]
struct EarningsRow {
    ticker: String,
    report_date: NaiveDate,
    fiscal_quarter: Option<String>,
    estimate_eps: Option<f64>,
    actual_eps: Option<f64>,
    surprise_pct: Option<f64>,
    estimate_revenue: Option<f64>,
    actual_revenue: Option<f64>,
    guidance: Option<String>,
    notes: Option<String>,
}

impl From<EarningsRow> for EarningsEvent {
    fn from(row: EarningsRow) -> Self {
        EarningsEvent {
            ticker: row.ticker,
            report_date: row.report_date,
            fiscal_quarter: row.fiscal_quarter,
            estimate_eps: row.estimate_eps,
            actual_eps: row.actual_eps,
            surprise_pct: row.surprise_pct,
            estimate_revenue: row.estimate_revenue,
            actual_revenue: row.actual_revenue,
            guidance: row.guidance,
            notes: row.notes,
        }
    }
}

/// Upserts on `(ticker, report_date)`. The surprise percentage is always recomputed
/// from the EPS fields being written.
pub async fn upsert(pool: &SqlitePool, event: &EarningsEvent) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO earnings (ticker, report_date, fiscal_quarter, estimate_eps, actual_eps, \
                               surprise_pct, estimate_revenue, actual_revenue, guidance, notes) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (ticker, report_date) DO UPDATE SET \
             fiscal_quarter = excluded.fiscal_quarter, \
             estimate_eps = excluded.estimate_eps, \
             actual_eps = excluded.actual_eps, \
             surprise_pct = excluded.surprise_pct, \
             estimate_revenue = excluded.estimate_revenue, \
             actual_revenue = excluded.actual_revenue, \
             guidance = excluded.guidance, \
             notes = excluded.notes",
    )
    .bind(normalize_ticker(&event.ticker))
    .bind(event.report_date)
    .bind(&event.fiscal_quarter)
    .bind(event.estimate_eps)
    .bind(event.actual_eps)
    .bind(surprise_pct(event.estimate_eps, event.actual_eps))
    .bind(event.estimate_revenue)
    .bind(event.actual_revenue)
    .bind(&event.guidance)
    .bind(&event.notes)
    .execute(pool)
    .await
    .context("upsert earnings failed")?;
    Ok(())
}

/// Records a scheduled report date without touching any results already stored for it.
pub async fn record_report_date(
    pool: &SqlitePool,
    ticker: &str,
    report_date: NaiveDate,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO earnings (ticker, report_date) VALUES (?, ?) \
         ON CONFLICT (ticker, report_date) DO NOTHING",
    )
    .bind(normalize_ticker(ticker))
    .bind(report_date)
    .execute(pool)
    .await
    .context("insert earnings date failed")?;
    Ok(())
}

pub async fn history(pool: &SqlitePool, ticker: &str) -> anyhow::Result<Vec<EarningsEvent>> {
    let rows = sqlx::query_as::<_, EarningsRow>(
        "SELECT ticker, report_date, fiscal_quarter, estimate_eps, actual_eps, surprise_pct, \
                estimate_revenue, actual_revenue, guidance, notes \
         FROM earnings WHERE ticker = ? ORDER BY report_date DESC",
    )
    .bind(normalize_ticker(ticker))
    .fetch_all(pool)
    .await
    .context("select earnings failed")?;

    Ok(rows.into_iter().map(EarningsEvent::from).collect())
}

#[derive(Debug, sqlx::FromRow)]
struct UpcomingRow {
    ticker: String,
    report_date: NaiveDate,
    name: String,
    stance: String,
}

/// Stored, not-yet-reported earnings for active watchlist tickers within
/// `[today, today + days]`, soonest first.
pub async fn upcoming(
    pool: &SqlitePool,
    today: NaiveDate,
    days: u32,
) -> anyhow::Result<Vec<CalendarEntry>> {
    let end = today + Duration::days(i64::from(days));

    let rows = sqlx::query_as::<_, UpcomingRow>(
        "SELECT e.ticker, e.report_date, w.name, w.stance \
         FROM earnings e \
         JOIN watchlist w ON e.ticker = w.ticker \
         WHERE e.report_date >= ? AND e.report_date <= ? \
           AND w.active = 1 \
           AND e.actual_eps IS NULL \
         ORDER BY e.report_date ASC, e.ticker ASC",
    )
    .bind(today)
    .bind(end)
    .fetch_all(pool)
    .await
    .context("select upcoming earnings failed")?;

    rows.into_iter()
        .map(|row| {
            Ok(CalendarEntry {
                days_until: (row.report_date - today).num_days(),
                stance: row
                    .stance
                    .parse::<Stance>()
                    .with_context(|| format!("bad stance stored for {}", row.ticker))?,
                ticker: row.ticker,
                name: row.name,
                report_date: row.report_date,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_pool;
    use crate::storage::watchlist::{self, new_entry};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[tokio::test]
    async fn upsert_computes_surprise_and_overwrites() {
        let pool = test_pool().await;
        let mut ev = EarningsEvent::new("nvda", day(20));
        ev.estimate_eps = Some(1.0);
        upsert(&pool, &ev).await.unwrap();

        ev.actual_eps = Some(1.2);
        ev.guidance = Some("raised".to_string());
        upsert(&pool, &ev).await.unwrap();

        let rows = history(&pool, "NVDA").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].surprise_pct.unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(rows[0].guidance.as_deref(), Some("raised"));
    }

    #[tokio::test]
    async fn recording_a_date_keeps_existing_results() {
        let pool = test_pool().await;
        let mut ev = EarningsEvent::new("NVDA", day(20));
        ev.estimate_eps = Some(0.8);
        upsert(&pool, &ev).await.unwrap();

        record_report_date(&pool, "NVDA", day(20)).await.unwrap();

        let rows = history(&pool, "NVDA").await.unwrap();
        assert_eq!(rows[0].estimate_eps, Some(0.8));
    }

    #[tokio::test]
    async fn upcoming_joins_active_watchlist_and_skips_reported() {
        let pool = test_pool().await;
        watchlist::add(&pool, &new_entry("NVDA", "NVIDIA", Stance::Buy), day(1)).await.unwrap();
        watchlist::add(&pool, &new_entry("AMD", "AMD", Stance::Hold), day(1)).await.unwrap();
        watchlist::add(&pool, &new_entry("INTC", "Intel", Stance::Sell), day(1)).await.unwrap();
        watchlist::remove(&pool, "INTC").await.unwrap();

        record_report_date(&pool, "NVDA", day(24)).await.unwrap();
        record_report_date(&pool, "AMD", day(18)).await.unwrap();
        record_report_date(&pool, "INTC", day(17)).await.unwrap();
        // Outside the window.
        record_report_date(&pool, "AMD", day(30)).await.unwrap();
        // Already reported.
        let mut reported = EarningsEvent::new("NVDA", day(19));
        reported.actual_eps = Some(1.0);
        upsert(&pool, &reported).await.unwrap();

        let got = upcoming(&pool, day(16), 8).await.unwrap();
        let tickers: Vec<_> = got.iter().map(|e| (e.ticker.as_str(), e.days_until)).collect();
        assert_eq!(tickers, vec![("AMD", 2), ("NVDA", 8)]);
        assert_eq!(got[1].name, "NVIDIA");
        assert_eq!(got[1].stance, Stance::Buy);
    }
}
