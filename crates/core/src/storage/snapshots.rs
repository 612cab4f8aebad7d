use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::chart::{ChartItem, Snapshot};

type SnapshotRow = (Uuid, DateTime<Utc>, String, String, i32, String);

type ChartItemRow = (
    Uuid,
    i32,
    String,
    String,
    String,
    String,
    String,
    Vec<String>,
    Vec<String>,
    Option<String>,
    Vec<String>,
    Option<i64>,
    Option<f64>,
);

const SNAPSHOT_COLUMNS: &str = "id, collected_at, country, chart, limit_n, source_url";

const ITEM_COLUMNS: &str = "snapshot_id, rank, app_id, app_name, artist_name, app_url, \
     release_date, genres, genre_ids, primary_genre, lookup_genres, rating_count, average_rating";

/// Insert one snapshot and all of its items in a single transaction.
pub async fn insert_snapshot(
    pool: &sqlx::PgPool,
    snapshot: &Snapshot,
    items: &[ChartItem],
) -> anyhow::Result<()> {
    anyhow::ensure!(!items.is_empty(), "snapshot must have at least one item");

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    sqlx::query(
        "INSERT INTO snapshots (id, collected_at, country, chart, limit_n, source_url) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(snapshot.id)
    .bind(snapshot.collected_at)
    .bind(&snapshot.country)
    .bind(&snapshot.chart)
    .bind(snapshot.limit)
    .bind(&snapshot.source_url)
    .execute(&mut *tx)
    .await
    .context("insert snapshots failed")?;

    for item in items {
        sqlx::query(
            "INSERT INTO chart_items (snapshot_id, rank, app_id, app_name, artist_name, \
             app_url, release_date, genres, genre_ids, primary_genre, lookup_genres, \
             rating_count, average_rating) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(item.snapshot_id)
        .bind(item.rank)
        .bind(&item.app_id)
        .bind(&item.app_name)
        .bind(&item.artist_name)
        .bind(&item.app_url)
        .bind(&item.release_date)
        .bind(&item.genres)
        .bind(&item.genre_ids)
        .bind(&item.primary_genre)
        .bind(&item.lookup_genres)
        .bind(item.rating_count)
        .bind(item.average_rating)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("insert chart_items failed (rank={})", item.rank))?;
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(())
}

/// All snapshots for a (country, chart) pair, ascending by collection time.
pub async fn list_snapshots(
    pool: &sqlx::PgPool,
    country: &str,
    chart: &str,
) -> anyhow::Result<Vec<Snapshot>> {
    let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM snapshots \
         WHERE country = $1 AND chart = $2 \
         ORDER BY collected_at ASC"
    ))
    .bind(country)
    .bind(chart)
    .fetch_all(pool)
    .await
    .context("list snapshots failed")?;

    Ok(rows.into_iter().map(snapshot_from_row).collect())
}

pub async fn latest_snapshot(
    pool: &sqlx::PgPool,
    country: &str,
    chart: &str,
) -> anyhow::Result<Option<Snapshot>> {
    let row = sqlx::query_as::<_, SnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM snapshots \
         WHERE country = $1 AND chart = $2 \
         ORDER BY collected_at DESC \
         LIMIT 1"
    ))
    .bind(country)
    .bind(chart)
    .fetch_optional(pool)
    .await
    .context("fetch latest snapshot failed")?;

    Ok(row.map(snapshot_from_row))
}

pub async fn previous_snapshot(
    pool: &sqlx::PgPool,
    country: &str,
    chart: &str,
    before: DateTime<Utc>,
) -> anyhow::Result<Option<Snapshot>> {
    let row = sqlx::query_as::<_, SnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM snapshots \
         WHERE country = $1 AND chart = $2 AND collected_at < $3 \
         ORDER BY collected_at DESC \
         LIMIT 1"
    ))
    .bind(country)
    .bind(chart)
    .bind(before)
    .fetch_optional(pool)
    .await
    .context("fetch previous snapshot failed")?;

    Ok(row.map(snapshot_from_row))
}

/// Items of one snapshot, ascending by rank.
pub async fn snapshot_items(
    pool: &sqlx::PgPool,
    snapshot_id: Uuid,
) -> anyhow::Result<Vec<ChartItem>> {
    let rows = sqlx::query_as::<_, ChartItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM chart_items \
         WHERE snapshot_id = $1 \
         ORDER BY rank ASC"
    ))
    .bind(snapshot_id)
    .fetch_all(pool)
    .await
    .context("fetch snapshot items failed")?;

    Ok(rows
        .into_iter()
        .map(
            |(
                snapshot_id,
                rank,
                app_id,
                app_name,
                artist_name,
                app_url,
                release_date,
                genres,
                genre_ids,
                primary_genre,
                lookup_genres,
                rating_count,
                average_rating,
            )| ChartItem {
                snapshot_id,
                rank,
                app_id,
                app_name,
                artist_name,
                app_url,
                release_date,
                genres,
                genre_ids,
                primary_genre,
                lookup_genres,
                rating_count,
                average_rating,
            },
        )
        .collect())
}

fn snapshot_from_row((id, collected_at, country, chart, limit, source_url): SnapshotRow) -> Snapshot {
    Snapshot {
        id,
        collected_at,
        country,
        chart,
        limit,
        source_url,
    }
}
