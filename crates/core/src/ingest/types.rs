use serde::{Deserialize, Serialize};

/// App Store marketing-tools RSS chart feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssResponse {
    pub feed: RssFeed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssFeed {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub results: Vec<RssApp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssApp {
    pub id: String,
    pub name: String,
    #[serde(rename = "artistName", default)]
    pub artist_name: String,
    #[serde(rename = "releaseDate", default)]
    pub release_date: String,
    #[serde(rename = "artworkUrl100", default)]
    pub artwork_url: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub genres: Vec<RssGenre>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssGenre {
    #[serde(rename = "genreId", default)]
    pub genre_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// Split a feed entry's genres into name and ID lists, dropping blanks.
pub fn extract_genres(genres: &[RssGenre]) -> (Vec<String>, Vec<String>) {
    let names = genres
        .iter()
        .filter(|g| !g.name.is_empty())
        .map(|g| g.name.clone())
        .collect();
    let ids = genres
        .iter()
        .filter(|g| !g.genre_id.is_empty())
        .map(|g| g.genre_id.clone())
        .collect();
    (names, ids)
}

/// iTunes lookup API response used for popularity enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResponse {
    #[serde(rename = "resultCount", default)]
    pub result_count: i64,
    #[serde(default)]
    pub results: Vec<LookupApp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupApp {
    #[serde(rename = "trackId", default)]
    pub track_id: i64,
    #[serde(rename = "trackName", default)]
    pub track_name: String,
    #[serde(rename = "sellerName", default)]
    pub seller_name: String,
    #[serde(rename = "primaryGenreName", default)]
    pub primary_genre_name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(rename = "userRatingCount", default)]
    pub user_rating_count: i64,
    #[serde(rename = "averageUserRating", default)]
    pub average_user_rating: f64,
}
