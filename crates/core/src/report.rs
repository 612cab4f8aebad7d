use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::themes::ThemeConfig;
use crate::analysis::timeseries::{build_time_series, TimeSeriesPayload};
use crate::analysis::trends::{analyze_trends, sort_theme_scores};
use crate::domain::chart::Snapshot;
use crate::domain::trend::{AppTrend, ThemeScore, TrendConfig};
use crate::storage::snapshots;

/// Fewer snapshots exist than the requested computation needs. Surfaced as
/// a typed error so callers can distinguish it from infrastructure
/// failures via `downcast_ref`.
#[derive(Debug, Clone)]
pub struct InsufficientDataError {
    pub country: String,
    pub chart: String,
    pub needed: usize,
    pub available: usize,
}

impl fmt::Display for InsufficientDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "need at least {} snapshots for {}/{} (have {})",
            self.needed, self.country, self.chart, self.available
        )
    }
}

impl std::error::Error for InsufficientDataError {}

/// Report payload for one snapshot transition, shaped for JSON consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPayload {
    pub latest: Snapshot,
    pub previous: Snapshot,
    pub generated_at: chrono::DateTime<Utc>,
    pub trends: Vec<AppTrend>,
    pub theme_scores: Vec<ThemeScore>,
    pub risk_on_score: f64,
    pub risk_off_score: f64,
    pub rotation_index: f64,
}

/// Compare the two most recent snapshots of a market/chart pair.
pub async fn compute_report(
    pool: &sqlx::PgPool,
    country: &str,
    chart: &str,
    themes: &ThemeConfig,
    cfg: TrendConfig,
) -> anyhow::Result<ReportPayload> {
    let latest = snapshots::latest_snapshot(pool, country, chart).await?;
    let Some(latest) = latest else {
        return Err(insufficient(country, chart, 2, 0));
    };
    let previous = snapshots::previous_snapshot(pool, country, chart, latest.collected_at).await?;
    let Some(previous) = previous else {
        return Err(insufficient(country, chart, 2, 1));
    };

    let latest_items = snapshots::snapshot_items(pool, latest.id).await?;
    let previous_items = snapshots::snapshot_items(pool, previous.id).await?;

    let result = analyze_trends(&latest, &previous, &latest_items, &previous_items, cfg, themes);

    Ok(ReportPayload {
        latest,
        previous,
        generated_at: Utc::now(),
        trends: result.trends,
        theme_scores: sort_theme_scores(&result.theme_scores),
        risk_on_score: result.risk_on_score,
        risk_off_score: result.risk_off_score,
        rotation_index: result.rotation_index,
    })
}

/// Build the day-bucketed time series over every stored snapshot of a
/// market/chart pair.
pub async fn compute_time_series(
    pool: &sqlx::PgPool,
    country: &str,
    chart: &str,
    themes: &ThemeConfig,
    cfg: TrendConfig,
    top_n: usize,
) -> anyhow::Result<TimeSeriesPayload> {
    let snapshot_list = snapshots::list_snapshots(pool, country, chart).await?;
    if snapshot_list.is_empty() {
        return Err(insufficient(country, chart, 1, 0));
    }

    let mut items = Vec::with_capacity(snapshot_list.len());
    for snapshot in &snapshot_list {
        items.push(snapshots::snapshot_items(pool, snapshot.id).await?);
    }

    Ok(build_time_series(
        &snapshot_list,
        &items,
        cfg,
        themes,
        country,
        chart,
        top_n,
    ))
}

fn insufficient(country: &str, chart: &str, needed: usize, available: usize) -> anyhow::Error {
    anyhow::Error::new(InsufficientDataError {
        country: country.to_string(),
        chart: chart.to_string(),
        needed,
        available,
    })
}
