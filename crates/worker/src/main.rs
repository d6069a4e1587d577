use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trader_core::config::Settings;
use trader_core::ingest::provider::{HttpJsonProvider, MarketDataProvider};
use trader_core::storage::runs::{record_job_run, JobStatus};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod import;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/trader.db";
const DEFAULT_CALENDAR_DAYS: u32 = 14;

#[derive(Debug, Parser)]
#[command(name = "trader_worker")]
struct Args {
    /// Market as-of date (YYYY-MM-DD). Defaults to today in the market's UTC offset.
    #[arg(long, global = true)]
    as_of_date: Option<String>,

    /// Do everything except writing to the database.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score every active watchlist ticker and record today's recommendations.
    Recommend,
    /// Refresh prices, news and next earnings dates for the watchlist.
    Daily,
    /// Print upcoming earnings for the watchlist as JSON.
    Calendar {
        #[arg(long, default_value_t = DEFAULT_CALENDAR_DAYS)]
        days: u32,
    },
    /// Add or update watchlist entries from a JSON array.
    ImportWatchlist { path: PathBuf },
    /// Store signal observations from a JSON array.
    ImportSignals { path: PathBuf },
    /// Journal trades from a JSON array.
    ImportTrades { path: PathBuf },
}

impl Command {
    fn kind(&self) -> &'static str {
        match self {
            Command::Recommend => "recommend",
            Command::Daily => "daily",
            Command::Calendar { .. } => "calendar",
            Command::ImportWatchlist { .. } => "import_watchlist",
            Command::ImportSignals { .. } => "import_signals",
            Command::ImportTrades { .. } => "import_trades",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let as_of_date = trader_core::time::market_date::resolve_as_of_date(
        args.as_of_date.as_deref(),
        chrono::Utc::now(),
        settings.market_utc_offset_hours,
    )?;

    let db_url = settings.database_url_or(DEFAULT_DATABASE_URL);
    let pool = trader_core::storage::connect(db_url).await?;

    let kind = args.command.kind();
    let generated_at = chrono::Utc::now();
    let result = run(&settings, &pool, args.command, as_of_date, args.dry_run).await;

    let (status, error, summary) = match &result {
        Ok(summary) => (JobStatus::Success, None, summary.clone()),
        Err(err) => {
            sentry_anyhow::capture_anyhow(err);
            tracing::error!(kind, %as_of_date, error = %err, "worker run failed");
            (JobStatus::Error, Some(format!("{err:#}")), None)
        }
    };

    if !args.dry_run {
        let run_id = record_job_run(
            &pool,
            kind,
            as_of_date,
            generated_at,
            status,
            error.as_deref(),
            summary,
        )
        .await?;
        tracing::info!(kind, %as_of_date, %run_id, status = status.as_str(), "job run recorded");
    }

    result.map(|_| ())
}

/// Runs one subcommand. Returns a JSON summary for the job run record.
async fn run(
    settings: &Settings,
    pool: &sqlx::SqlitePool,
    command: Command,
    as_of_date: chrono::NaiveDate,
    dry_run: bool,
) -> anyhow::Result<Option<serde_json::Value>> {
    match command {
        Command::Recommend => {
            let provider = match HttpJsonProvider::from_settings(settings) {
                Ok(p) => Some(p),
                Err(err) => {
                    tracing::warn!(error = %err, "market data provider unavailable");
                    None
                }
            };
            let summary = trader_core::pipeline::run_recommendations(
                pool,
                provider.as_ref().map(|p| p as &dyn MarketDataProvider),
                &settings.scoring_config(),
                as_of_date,
                dry_run,
            )
            .await?;
            tracing::info!(
                %as_of_date,
                dry_run,
                tickers = summary.tickers,
                recorded = summary.recorded,
                failed = summary.failed,
                "recommendation run finished"
            );
            Ok(Some(serde_json::to_value(&summary)?))
        }
        Command::Daily => {
            let provider = HttpJsonProvider::from_settings(settings)?;
            if dry_run {
                tracing::info!(%as_of_date, dry_run, "daily refresh skipped");
                return Ok(None);
            }
            let summary = trader_core::pipeline::run_daily(pool, &provider, as_of_date).await?;
            Ok(Some(serde_json::to_value(&summary)?))
        }
        Command::Calendar { days } => {
            let provider = HttpJsonProvider::from_settings(settings)?;
            let entries = trader_core::storage::watchlist::list(pool, true).await?;
            let calendar =
                trader_core::calendar::earnings_calendar(&provider, &entries, as_of_date, days)
                    .await;
            println!(
                "{}",
                serde_json::to_string_pretty(&calendar).context("serialize calendar failed")?
            );
            Ok(Some(serde_json::json!({ "days": days, "entries": calendar.len() })))
        }
        Command::ImportWatchlist { path } => {
            let records = import::load_records(&path)?;
            // Enrichment is best-effort; imports still work without a configured provider.
            let provider = HttpJsonProvider::from_settings(settings).ok();
            let written = import::import_watchlist(
                pool,
                provider.as_ref().map(|p| p as &dyn MarketDataProvider),
                records,
                as_of_date,
                dry_run,
            )
            .await?;
            tracing::info!(path = %path.display(), written, dry_run, "watchlist import finished");
            Ok(Some(serde_json::json!({ "path": path.display().to_string(), "records": written })))
        }
        Command::ImportSignals { path } => {
            let records = import::load_records(&path)?;
            let written = import::import_signals(pool, records, as_of_date, dry_run).await?;
            tracing::info!(path = %path.display(), written, dry_run, "signal import finished");
            Ok(Some(serde_json::json!({ "path": path.display().to_string(), "records": written })))
        }
        Command::ImportTrades { path } => {
            let records = import::load_records(&path)?;
            let ids = import::import_trades(pool, records, as_of_date, dry_run).await?;
            tracing::info!(path = %path.display(), trades = ids.len(), dry_run, "trade import finished");
            Ok(Some(serde_json::json!({ "path": path.display().to_string(), "trade_ids": ids })))
        }
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
