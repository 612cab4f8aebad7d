use std::cmp::Ordering;
use std::collections::HashMap;

use crate::analysis::stats::{mean_std, zscore};
use crate::analysis::themes::{ThemeClassifier, ThemeConfig, ThemeInput};
use crate::domain::chart::{ChartItem, Snapshot};
use crate::domain::trend::{AppTrend, ThemeScore, TrendConfig, TrendResult};

/// Score one snapshot transition.
///
/// Pure function over its inputs; an empty `latest_items` yields an empty
/// trend list and zero aggregates. `previous` may equal `latest` when the
/// series has no real predecessor, which produces zero deltas and no new
/// entries.
pub fn analyze_trends(
    latest: &Snapshot,
    previous: &Snapshot,
    latest_items: &[ChartItem],
    previous_items: &[ChartItem],
    cfg: TrendConfig,
    themes: &ThemeConfig,
) -> TrendResult {
    tracing::debug!(
        latest_id = %latest.id,
        previous_id = %previous.id,
        items = latest_items.len(),
        "analyzing snapshot transition"
    );

    let prev_by_app: HashMap<&str, &ChartItem> = previous_items
        .iter()
        .map(|item| (item.app_id.as_str(), item))
        .collect();

    let classifier = ThemeClassifier::new(themes);

    let mut rank_deltas = Vec::with_capacity(latest_items.len());
    let mut review_deltas = Vec::with_capacity(latest_items.len());
    let mut trends = Vec::with_capacity(latest_items.len());

    for item in latest_items {
        let prev = prev_by_app.get(item.app_id.as_str()).copied();
        // An app absent from the previous chart is treated as having sat
        // just outside it.
        let prev_rank = prev.map_or(latest.limit + 1, |p| p.rank);
        let rank_delta = prev_rank - item.rank;
        let rating_delta = rating_delta(item, prev);

        rank_deltas.push(f64::from(rank_delta));
        review_deltas.push(rating_delta as f64);

        let theme = classifier.classify(&ThemeInput {
            name: &item.app_name,
            genres: &item.genres,
            genre_ids: &item.genre_ids,
            primary_genre: item.primary_genre.as_deref(),
            lookup_genres: &item.lookup_genres,
        });

        trends.push(AppTrend {
            app_id: item.app_id.clone(),
            app_name: item.app_name.clone(),
            app_url: item.app_url.clone(),
            rank: item.rank,
            rank_delta,
            rating_count: item.rating_count.unwrap_or(0),
            rating_delta,
            trend_score: 0.0,
            theme,
            new_entry: prev.is_none(),
        });
    }

    let (rank_mean, rank_std) = mean_std(&rank_deltas);
    let (review_mean, review_std) = mean_std(&review_deltas);

    for trend in &mut trends {
        let rank_z = zscore(f64::from(trend.rank_delta), rank_mean, rank_std);
        let review_z = zscore(trend.rating_delta as f64, review_mean, review_std);
        let mut score = cfg.rank_weight * rank_z + cfg.review_weight * review_z;
        if trend.new_entry {
            score += cfg.new_entry_bonus;
        }
        trend.trend_score = score;
    }

    // Stable sort: score ties keep chart-rank order.
    trends.sort_by(|a, b| {
        b.trend_score
            .partial_cmp(&a.trend_score)
            .unwrap_or(Ordering::Equal)
    });

    let mut theme_totals: HashMap<String, (f64, usize)> = HashMap::new();
    for trend in &trends {
        let entry = theme_totals.entry(trend.theme.clone()).or_insert((0.0, 0));
        entry.0 += trend.trend_score;
        entry.1 += 1;
    }
    let theme_scores: HashMap<String, f64> = theme_totals
        .into_iter()
        .map(|(theme, (total, count))| (theme, total / count as f64))
        .collect();

    let risk_on_score = average_themes(&theme_scores, &themes.risk_on);
    let risk_off_score = average_themes(&theme_scores, &themes.risk_off);

    TrendResult {
        trends,
        theme_scores,
        risk_on_score,
        risk_off_score,
        rotation_index: risk_on_score - risk_off_score,
    }
}

fn rating_delta(current: &ChartItem, prev: Option<&ChartItem>) -> i64 {
    let Some(count) = current.rating_count else {
        return 0;
    };
    match prev.and_then(|p| p.rating_count) {
        Some(prev_count) => count - prev_count,
        // First observation: the whole count is the delta.
        None => count,
    }
}

/// Mean score of the group's themes that actually have data; themes with
/// no scored apps are skipped, not counted as zero. A group with no
/// qualifying theme scores 0.
fn average_themes(scores: &HashMap<String, f64>, group: &[String]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for theme in group {
        if let Some(score) = scores.get(theme) {
            sum += score;
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    sum / count as f64
}

/// Flatten the theme-score map into a list sorted by score descending,
/// breaking ties by theme name so output is deterministic.
pub fn sort_theme_scores(scores: &HashMap<String, f64>) -> Vec<ThemeScore> {
    let mut list: Vec<ThemeScore> = scores
        .iter()
        .map(|(theme, score)| ThemeScore {
            theme: theme.clone(),
            score: *score,
        })
        .collect();
    list.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.theme.cmp(&b.theme))
    });
    list
}
