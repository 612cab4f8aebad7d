use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Weights applied when combining the normalized deltas into one score.
#[derive(Debug, Clone, Copy)]
pub struct TrendConfig {
    pub rank_weight: f64,
    pub review_weight: f64,
    pub new_entry_bonus: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            rank_weight: 1.0,
            review_weight: 1.0,
            new_entry_bonus: 0.5,
        }
    }
}

/// Per-app record for one snapshot transition. Computed fresh on every
/// analysis call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppTrend {
    pub app_id: String,
    pub app_name: String,
    pub app_url: String,
    pub rank: i32,
    /// Previous rank minus current rank; positive means the app climbed.
    pub rank_delta: i32,
    /// 0 when the lookup enrichment produced no count.
    pub rating_count: i64,
    pub rating_delta: i64,
    pub trend_score: f64,
    pub theme: String,
    pub new_entry: bool,
}

/// Aggregate output of one snapshot transition.
#[derive(Debug, Clone, Default)]
pub struct TrendResult {
    pub trends: Vec<AppTrend>,
    /// Mean trend score per theme; only themes present in this transition.
    pub theme_scores: HashMap<String, f64>,
    pub risk_on_score: f64,
    pub risk_off_score: f64,
    pub rotation_index: f64,
}

/// A (theme, score) pair for sorted report listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeScore {
    pub theme: String,
    pub score: f64,
}
