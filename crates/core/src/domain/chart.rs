use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One timestamped capture of a ranked chart. Created once by the fetch
/// pipeline and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub collected_at: DateTime<Utc>,
    pub country: String,
    pub chart: String,
    pub limit: i32,
    pub source_url: String,
}

/// One ranked entry within a snapshot.
///
/// `genres`/`genre_ids` come from the RSS feed; `primary_genre`,
/// `lookup_genres`, `rating_count` and `average_rating` come from the
/// optional iTunes lookup enrichment and may be absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartItem {
    pub snapshot_id: Uuid,
    pub rank: i32,
    pub app_id: String,
    pub app_name: String,
    pub artist_name: String,
    pub app_url: String,
    pub release_date: String,
    pub genres: Vec<String>,
    pub genre_ids: Vec<String>,
    pub primary_genre: Option<String>,
    pub lookup_genres: Vec<String>,
    pub rating_count: Option<i64>,
    pub average_rating: Option<f64>,
}
