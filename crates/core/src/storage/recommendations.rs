use crate::domain::recommendation::{Recommendation, RecommendationCategory, WatchedRecommendation};
use crate::domain::watchlist::{normalize_ticker, Stance};
use anyhow::Context;
use chrono::NaiveDate;
use sqlx::SqlitePool;

#[derive(Debug, sqlx::FromRow)]
struct RecommendationRow {
    ticker: String,
    date: NaiveDate,
    recommendation: String,
    confidence: f64,
    rationale: String,
    factors: String,
}

impl TryFrom<RecommendationRow> for Recommendation {
    type Error = anyhow::Error;

    fn try_from(row: RecommendationRow) -> anyhow::Result<Self> {
        let recommendation = row
            .recommendation
            .parse::<RecommendationCategory>()
            .with_context(|| format!("bad recommendation stored for {} {}", row.ticker, row.date))?;
        let factors: Vec<String> = serde_json::from_str(&row.factors)
            .with_context(|| format!("bad factors stored for {} {}", row.ticker, row.date))?;

        Ok(Recommendation {
            ticker: row.ticker,
            date: row.date,
            recommendation,
            confidence: row.confidence,
            rationale: row.rationale,
            factors,
        })
    }
}

/// Writes the recommendation for `(ticker, date)`, replacing any earlier one for that day.
pub async fn record(pool: &SqlitePool, rec: &Recommendation) -> anyhow::Result<()> {
    let factors = serde_json::to_string(&rec.factors).context("serialize factors failed")?;

    sqlx::query(
        "INSERT INTO recommendations (ticker, date, recommendation, confidence, rationale, factors) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT (ticker, date) DO UPDATE SET \
             recommendation = excluded.recommendation, \
             confidence = excluded.confidence, \
             rationale = excluded.rationale, \
             factors = excluded.factors",
    )
    .bind(normalize_ticker(&rec.ticker))
    .bind(rec.date)
    .bind(rec.recommendation.as_str())
    .bind(rec.confidence)
    .bind(&rec.rationale)
    .bind(factors)
    .execute(pool)
    .await
    .with_context(|| format!("upsert recommendation failed for {}", rec.ticker))?;
    Ok(())
}

pub async fn get(
    pool: &SqlitePool,
    ticker: &str,
    date: NaiveDate,
) -> anyhow::Result<Option<Recommendation>> {
    let row = sqlx::query_as::<_, RecommendationRow>(
        "SELECT ticker, date, recommendation, confidence, rationale, factors \
         FROM recommendations WHERE ticker = ? AND date = ?",
    )
    .bind(normalize_ticker(ticker))
    .bind(date)
    .fetch_optional(pool)
    .await
    .context("select recommendation failed")?;
    row.map(Recommendation::try_from).transpose()
}

#[derive(Debug, sqlx::FromRow)]
struct WatchedRow {
    #[sqlx(flatten)]
    rec: RecommendationRow,
    name: String,
    stance: String,
}

/// The most recent recommendation of every active watchlist ticker, highest confidence first.
pub async fn latest_per_ticker(pool: &SqlitePool) -> anyhow::Result<Vec<WatchedRecommendation>> {
    let rows = sqlx::query_as::<_, WatchedRow>(
        "SELECT r.ticker, r.date, r.recommendation, r.confidence, r.rationale, r.factors, \
                w.name, w.stance \
         FROM recommendations r \
         JOIN watchlist w ON r.ticker = w.ticker \
         WHERE w.active = 1 \
           AND r.date = (SELECT MAX(r2.date) FROM recommendations r2 WHERE r2.ticker = r.ticker) \
         ORDER BY r.confidence DESC, r.ticker ASC",
    )
    .fetch_all(pool)
    .await
    .context("select latest recommendations failed")?;

    rows.into_iter()
        .map(|row| {
            let stance = row
                .stance
                .parse::<Stance>()
                .with_context(|| format!("bad stance stored for {}", row.rec.ticker))?;
            Ok(WatchedRecommendation {
                recommendation: Recommendation::try_from(row.rec)?,
                name: row.name,
                stance,
            })
        })
        .collect()
}
