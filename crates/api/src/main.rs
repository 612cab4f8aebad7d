use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chartpulse_core::analysis::themes::ThemeConfig;
use chartpulse_core::analysis::timeseries::TimeSeriesPayload;
use chartpulse_core::config::Settings;
use chartpulse_core::domain::trend::TrendConfig;
use chartpulse_core::report::{
    compute_report, compute_time_series, InsufficientDataError, ReportPayload,
};

const DEFAULT_TOP_N: usize = 10;

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

    // A corrupt theme file is a startup error; a missing one silently uses
    // the built-in defaults.
    let themes = Arc::new(ThemeConfig::load(settings.themes_path())?);

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match chartpulse_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let state = AppState {
        pool,
        themes,
        trend_config: trend_config_from_env(),
        default_country: settings.country().to_string(),
        default_chart: settings.chart().to_string(),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/report", get(get_report))
        .route("/api/timeseries", get(get_timeseries))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    pool: Option<PgPool>,
    themes: Arc<ThemeConfig>,
    trend_config: TrendConfig,
    default_country: String,
    default_chart: String,
}

#[derive(Debug, Deserialize)]
struct MarketQuery {
    country: Option<String>,
    chart: Option<String>,
    top: Option<usize>,
}

type NoStore<T> = ([(header::HeaderName, &'static str); 1], Json<T>);

fn no_store<T>(payload: T) -> NoStore<T> {
    ([(header::CACHE_CONTROL, "no-store")], Json(payload))
}

async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<MarketQuery>,
) -> Result<NoStore<ReportPayload>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let country = query.country.as_deref().unwrap_or(&state.default_country);
    let chart = query.chart.as_deref().unwrap_or(&state.default_chart);

    let payload = compute_report(pool, country, chart, &state.themes, state.trend_config)
        .await
        .map_err(map_error)?;

    Ok(no_store(payload))
}

async fn get_timeseries(
    State(state): State<AppState>,
    Query(query): Query<MarketQuery>,
) -> Result<NoStore<TimeSeriesPayload>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let country = query.country.as_deref().unwrap_or(&state.default_country);
    let chart = query.chart.as_deref().unwrap_or(&state.default_chart);
    let top_n = query.top.unwrap_or(DEFAULT_TOP_N);

    let payload = compute_time_series(
        pool,
        country,
        chart,
        &state.themes,
        state.trend_config,
        top_n,
    )
    .await
    .map_err(map_error)?;

    Ok(no_store(payload))
}

fn map_error(err: anyhow::Error) -> StatusCode {
    if let Some(missing) = err.downcast_ref::<InsufficientDataError>() {
        tracing::warn!(%missing, "analysis request cannot be fulfilled yet");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %err, "analysis request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

fn trend_config_from_env() -> TrendConfig {
    let mut cfg = TrendConfig::default();
    if let Some(v) = env_f64("TREND_RANK_WEIGHT") {
        cfg.rank_weight = v;
    }
    if let Some(v) = env_f64("TREND_REVIEW_WEIGHT") {
        cfg.review_weight = v;
    }
    if let Some(v) = env_f64("TREND_NEW_ENTRY_BONUS") {
        cfg.new_entry_bonus = v;
    }
    cfg
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
