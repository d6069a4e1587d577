//! Earnings window selection for the watchlist.

use crate::domain::earnings::CalendarEntry;
use crate::domain::watchlist::WatchlistEntry;
use crate::ingest::provider::MarketDataProvider;
use chrono::{Duration, NaiveDate};

/// Keeps active entries whose report date falls in `[today, today + horizon_days]`,
/// ordered by report date. The sort is stable, so same-day reports keep input order.
/// Entries without a report date are dropped.
pub fn select_window<'a, I>(
    candidates: I,
    today: NaiveDate,
    horizon_days: u32,
) -> Vec<CalendarEntry>
where
    I: IntoIterator<Item = (&'a WatchlistEntry, Option<NaiveDate>)>,
{
    let end = today + Duration::days(i64::from(horizon_days));

    let mut out: Vec<CalendarEntry> = candidates
        .into_iter()
        .filter(|(entry, _)| entry.active)
        .filter_map(|(entry, report_date)| {
            let report_date = report_date?;
            if report_date < today || report_date > end {
                return None;
            }
            Some(CalendarEntry {
                ticker: entry.ticker.clone(),
                name: entry.name.clone(),
                report_date,
                days_until: (report_date - today).num_days(),
                stance: entry.stance,
            })
        })
        .collect();

    out.sort_by_key(|e| e.report_date);
    out
}

/// Looks up each active ticker's next report date and selects the window.
///
/// A failed lookup omits that ticker, same as a missing date.
pub async fn earnings_calendar(
    provider: &dyn MarketDataProvider,
    watchlist: &[WatchlistEntry],
    today: NaiveDate,
    horizon_days: u32,
) -> Vec<CalendarEntry> {
    let mut resolved = Vec::with_capacity(watchlist.len());

    for entry in watchlist.iter().filter(|e| e.active) {
        let report_date = match provider.next_earnings_date(&entry.ticker).await {
            Ok(d) => d,
            Err(err) => {
                tracing::warn!(ticker = %entry.ticker, error = %err, "next earnings date lookup failed; omitting");
                None
            }
        };
        resolved.push((entry, report_date));
    }

    select_window(resolved, today, horizon_days)
}
