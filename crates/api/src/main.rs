use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trader_core::domain::earnings::CalendarEntry;
use trader_core::domain::recommendation::WatchedRecommendation;
use trader_core::domain::signal::SignalObservation;
use trader_core::domain::trade::Trade;
use trader_core::storage;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/trader.db";
const DEFAULT_UPCOMING_DAYS: u32 = 14;
const MAX_UPCOMING_DAYS: u32 = 365;
const DEFAULT_TRADE_LIMIT: u32 = 50;
const MAX_TRADE_LIMIT: u32 = 500;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = trader_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let db_url = settings.database_url_or(DEFAULT_DATABASE_URL);
    let pool = match storage::connect(db_url).await {
        Ok(pool) => Some(pool),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "db connect failed; starting API in degraded mode");
            None
        }
    };

    let state = AppState {
        pool,
        market_utc_offset_hours: settings.market_utc_offset_hours,
    };

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/recommendations/latest", get(get_latest_recommendations))
        .route("/earnings/upcoming", get(get_upcoming_earnings))
        .route("/signals/:ticker", get(get_latest_signals))
        .route("/trades/open", get(get_open_trades))
        .route("/trades", get(get_trades))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    pool: Option<SqlitePool>,
    market_utc_offset_hours: i32,
}

impl AppState {
    fn pool(&self) -> Result<&SqlitePool, StatusCode> {
        self.pool.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

fn internal_error(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn get_latest_recommendations(
    State(state): State<AppState>,
) -> Result<Json<Vec<WatchedRecommendation>>, StatusCode> {
    let pool = state.pool()?;
    let recs = storage::recommendations::latest_per_ticker(pool)
        .await
        .map_err(internal_error)?;
    Ok(Json(recs))
}

#[derive(Debug, Deserialize)]
struct UpcomingQuery {
    days: Option<u32>,
}

async fn get_upcoming_earnings(
    State(state): State<AppState>,
    Query(q): Query<UpcomingQuery>,
) -> Result<Json<Vec<CalendarEntry>>, StatusCode> {
    let pool = state.pool()?;

    let days = q.days.unwrap_or(DEFAULT_UPCOMING_DAYS);
    if days > MAX_UPCOMING_DAYS {
        return Err(StatusCode::BAD_REQUEST);
    }

    let today = trader_core::time::market_date::resolve_as_of_date(
        None,
        chrono::Utc::now(),
        state.market_utc_offset_hours,
    )
    .map_err(internal_error)?;

    let entries = storage::earnings::upcoming(pool, today, days)
        .await
        .map_err(internal_error)?;
    Ok(Json(entries))
}

async fn get_latest_signals(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Vec<SignalObservation>>, StatusCode> {
    let pool = state.pool()?;

    if ticker.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let latest = storage::signals::latest_signals(pool, &ticker)
        .await
        .map_err(internal_error)?;
    Ok(Json(latest))
}

async fn get_open_trades(State(state): State<AppState>) -> Result<Json<Vec<Trade>>, StatusCode> {
    let pool = state.pool()?;
    let trades = storage::trades::open_trades(pool)
        .await
        .map_err(internal_error)?;
    Ok(Json(trades))
}

#[derive(Debug, Deserialize)]
struct TradesQuery {
    ticker: Option<String>,
    limit: Option<u32>,
}

async fn get_trades(
    State(state): State<AppState>,
    Query(q): Query<TradesQuery>,
) -> Result<Json<Vec<Trade>>, StatusCode> {
    let pool = state.pool()?;

    let limit = q.limit.unwrap_or(DEFAULT_TRADE_LIMIT);
    if limit == 0 || limit > MAX_TRADE_LIMIT {
        return Err(StatusCode::BAD_REQUEST);
    }
    let ticker = q.ticker.as_deref().map(str::trim).filter(|t| !t.is_empty());

    let trades = storage::trades::history(pool, ticker, limit)
        .await
        .map_err(internal_error)?;
    Ok(Json(trades))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &trader_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
