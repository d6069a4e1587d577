use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        }
    }
}

/// Records one worker run. Returns the generated run id.
pub async fn record_job_run(
    pool: &SqlitePool,
    kind: &str,
    as_of_date: NaiveDate,
    generated_at: DateTime<Utc>,
    status: JobStatus,
    error: Option<&str>,
    summary: Option<serde_json::Value>,
) -> anyhow::Result<uuid::Uuid> {
    let id = uuid::Uuid::new_v4();

    sqlx::query(
        "INSERT INTO job_runs (id, kind, as_of_date, generated_at, status, error, summary) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(kind)
    .bind(as_of_date)
    .bind(generated_at)
    .bind(status.as_str())
    .bind(error)
    .bind(summary.map(|v| v.to_string()))
    .execute(pool)
    .await
    .context("insert job_runs failed")?;

    Ok(id)
}
