use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chartpulse_core::analysis::themes::ThemeConfig;
use chartpulse_core::config::{Settings, DEFAULT_LIMIT};
use chartpulse_core::domain::trend::TrendConfig;
use chartpulse_core::ingest::provider::{LookupClient, RssChartClient};
use chartpulse_core::report::{compute_report, compute_time_series};

mod ingest;

#[derive(Debug, Parser)]
#[command(name = "chartpulse_worker")]
struct Args {
    /// Storefront country code. Defaults to CHART_COUNTRY or "kr".
    #[arg(long, global = true)]
    country: Option<String>,

    /// Chart name (top-free, top-paid). Defaults to CHART_NAME or "top-free".
    #[arg(long, global = true)]
    chart: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, clap::Args)]
struct WeightArgs {
    /// Weight for the rank delta z-score.
    #[arg(long, default_value_t = 1.0)]
    rank_weight: f64,

    /// Weight for the review growth z-score.
    #[arg(long, default_value_t = 1.0)]
    review_weight: f64,

    /// Bonus for new chart entries.
    #[arg(long = "new-bonus", default_value_t = 0.5)]
    new_entry_bonus: f64,
}

impl From<WeightArgs> for TrendConfig {
    fn from(w: WeightArgs) -> Self {
        Self {
            rank_weight: w.rank_weight,
            review_weight: w.review_weight,
            new_entry_bonus: w.new_entry_bonus,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch one chart snapshot and persist it.
    Fetch {
        /// Chart size (25 or 50 recommended).
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: i32,

        /// Skip the per-app lookup enrichment.
        #[arg(long)]
        no_lookup: bool,

        /// Fetch and assemble, but do not write to the database.
        #[arg(long)]
        dry_run: bool,
    },
    /// Compare the two latest snapshots and write the report as JSON.
    Report {
        /// Output file path, or '-' for stdout.
        #[arg(long, default_value = "report.json")]
        out: String,

        #[command(flatten)]
        weights: WeightArgs,
    },
    /// Build the day-bucketed time series and write it as JSON.
    Timeseries {
        /// Output file path, or '-' for stdout.
        #[arg(long, default_value = "timeseries.json")]
        out: String,

        /// Top N apps for rank history.
        #[arg(long, default_value_t = 10)]
        top: usize,

        #[command(flatten)]
        weights: WeightArgs,
    },
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

    let country = args
        .country
        .clone()
        .unwrap_or_else(|| settings.country().to_string());
    let chart = args
        .chart
        .clone()
        .unwrap_or_else(|| settings.chart().to_string());

    match args.command {
        Command::Fetch {
            limit,
            no_lookup,
            dry_run,
        } => run_fetch(&settings, &country, &chart, limit, no_lookup, dry_run).await,
        Command::Report { out, weights } => {
            let pool = connect(&settings).await?;
            let themes = ThemeConfig::load(settings.themes_path())?;
            let payload = compute_report(&pool, &country, &chart, &themes, weights.into()).await?;
            write_json(&out, &payload)
        }
        Command::Timeseries { out, top, weights } => {
            let pool = connect(&settings).await?;
            let themes = ThemeConfig::load(settings.themes_path())?;
            let payload =
                compute_time_series(&pool, &country, &chart, &themes, weights.into(), top).await?;
            write_json(&out, &payload)
        }
    }
}

async fn run_fetch(
    settings: &Settings,
    country: &str,
    chart: &str,
    limit: i32,
    no_lookup: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    let provider = RssChartClient::from_settings(settings)?;
    let lookup = if no_lookup {
        None
    } else {
        Some(LookupClient::from_settings(settings)?)
    };

    if dry_run {
        let (snapshot, items) =
            ingest::build_snapshot(&provider, lookup.as_ref(), country, chart, limit).await?;
        tracing::info!(
            country,
            chart,
            dry_run = true,
            items = items.len(),
            collected_at = %snapshot.collected_at,
            "fetched snapshot (not persisted)"
        );
        return Ok(());
    }

    let pool = connect(settings).await?;

    let acquired =
        chartpulse_core::storage::lock::try_acquire_fetch_lock(&pool, country, chart).await?;
    if !acquired {
        tracing::warn!(country, chart, "fetch lock not acquired; another run in progress");
        return Ok(());
    }

    let result = ingest::fetch_snapshot(&pool, &provider, lookup.as_ref(), country, chart, limit).await;

    let outcome = match result {
        Ok((snapshot_id, count)) => {
            tracing::info!(%snapshot_id, country, chart, items = count, "saved snapshot");
            Ok(())
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(country, chart, error = %err, "snapshot fetch failed");
            Err(err)
        }
    };

    let _ = chartpulse_core::storage::lock::release_fetch_lock(&pool, country, chart).await;
    outcome
}

async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;
    chartpulse_core::storage::migrate(&pool).await?;
    Ok(pool)
}

fn write_json<T: Serialize>(out: &str, payload: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(payload).context("encode payload failed")?;
    if out == "-" {
        println!("{json}");
        return Ok(());
    }
    if let Some(dir) = Path::new(out).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create output directory {}", dir.display()))?;
        }
    }
    std::fs::write(out, json + "\n").with_context(|| format!("write {out}"))?;
    tracing::info!(out, "payload written");
    Ok(())
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
