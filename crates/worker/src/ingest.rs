use anyhow::Context;
use chrono::Utc;
use uuid::Uuid;

use chartpulse_core::domain::chart::{ChartItem, Snapshot};
use chartpulse_core::ingest::provider::{ChartProvider, LookupClient};
use chartpulse_core::ingest::types::extract_genres;
use chartpulse_core::storage::snapshots::insert_snapshot;

// Pacing between lookup calls; the lookup API throttles aggressively.
const LOOKUP_PACING_MS: u64 = 150;

/// Fetch one chart snapshot, enrich it via the lookup client when one is
/// given, and persist it. Enrichment failures are logged and skipped; the
/// item is stored without popularity metadata.
pub async fn fetch_snapshot(
    pool: &sqlx::PgPool,
    provider: &dyn ChartProvider,
    lookup: Option<&LookupClient>,
    country: &str,
    chart: &str,
    limit: i32,
) -> anyhow::Result<(Uuid, usize)> {
    let (snapshot, items) = build_snapshot(provider, lookup, country, chart, limit).await?;

    insert_snapshot(pool, &snapshot, &items)
        .await
        .context("persist snapshot failed")?;

    Ok((snapshot.id, items.len()))
}

/// Fetch and assemble a snapshot without touching the database (dry runs).
pub async fn build_snapshot(
    provider: &dyn ChartProvider,
    lookup: Option<&LookupClient>,
    country: &str,
    chart: &str,
    limit: i32,
) -> anyhow::Result<(Snapshot, Vec<ChartItem>)> {
    let (rss, source_url) = provider.fetch_top_chart(country, chart, limit).await?;
    anyhow::ensure!(
        !rss.feed.results.is_empty(),
        "chart feed returned no results"
    );

    let snapshot = Snapshot {
        id: Uuid::new_v4(),
        collected_at: Utc::now(),
        country: country.to_string(),
        chart: chart.to_string(),
        limit,
        source_url,
    };

    let mut items = Vec::with_capacity(rss.feed.results.len());
    for (idx, app) in rss.feed.results.iter().enumerate() {
        let rank = (idx + 1) as i32;
        let (genres, genre_ids) = extract_genres(&app.genres);

        let mut item = ChartItem {
            snapshot_id: snapshot.id,
            rank,
            app_id: app.id.clone(),
            app_name: app.name.clone(),
            artist_name: app.artist_name.clone(),
            app_url: app.url.clone(),
            release_date: app.release_date.clone(),
            genres,
            genre_ids,
            primary_genre: None,
            lookup_genres: Vec::new(),
            rating_count: None,
            average_rating: None,
        };

        if let Some(lookup) = lookup {
            match lookup.lookup_app(&app.id, country).await {
                Ok(Some(meta)) => {
                    item.primary_genre = Some(meta.primary_genre_name);
                    item.lookup_genres = meta.genres;
                    item.rating_count = Some(meta.user_rating_count);
                    item.average_rating = Some(meta.average_user_rating);
                }
                Ok(None) => {
                    tracing::debug!(app_id = %app.id, "no lookup match");
                }
                Err(err) => {
                    tracing::warn!(app_id = %app.id, error = %err, "lookup failed; storing without popularity data");
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(LOOKUP_PACING_MS)).await;
        }

        items.push(item);
    }

    Ok((snapshot, items))
}
