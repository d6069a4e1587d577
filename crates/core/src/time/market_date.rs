use anyhow::Context;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// US Eastern standard time. DST is ignored; set `MARKET_UTC_OFFSET_HOURS=-4` in summer
/// if the distinction matters for late-evening runs.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = -5;

/// Parses a whole-hour UTC offset, accepting the range real time zones use.
pub fn parse_utc_offset_hours(s: &str) -> anyhow::Result<i32> {
    let hours = s
        .trim()
        .parse::<i32>()
        .with_context(|| format!("utc offset must be an integer number of hours: {s:?}"))?;
    anyhow::ensure!(
        (-12..=14).contains(&hours),
        "utc offset must be within -12..=14 hours (got {hours})"
    );
    Ok(hours)
}

/// An explicit `YYYY-MM-DD` wins; otherwise the calendar date in the market's offset.
pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
    utc_offset_hours: i32,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid as-of date {s:?} (expected YYYY-MM-DD)"));
    }

    let offset = utc_offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .with_context(|| format!("invalid market utc offset: {utc_offset_hours}h"))?;
    Ok(now_utc.with_timezone(&offset).date_naive())
}
