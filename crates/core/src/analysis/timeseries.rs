use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::analysis::themes::ThemeConfig;
use crate::analysis::trends::analyze_trends;
use crate::domain::chart::{ChartItem, Snapshot};
use crate::domain::trend::TrendConfig;
use crate::time::market_day::market_day;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesMeta {
    pub country: String,
    pub chart: String,
    pub limit: i32,
}

/// Day-aligned series for chart rendering. Every array holds one entry per
/// retained day, in day order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesPayload {
    pub meta: TimeSeriesMeta,
    pub dates: Vec<String>,
    pub rotation_index: Vec<f64>,
    pub risk_on_score: Vec<f64>,
    pub risk_off_score: Vec<f64>,
    pub theme_scores: BTreeMap<String, Vec<f64>>,
    pub top_apps: Vec<TopAppSeries>,
}

/// Rank and rating-count history for one of the most recently charted
/// apps. Entries are `None` for days the app was off the chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopAppSeries {
    pub app_id: String,
    pub app_name: String,
    pub app_url: String,
    pub ranks: Vec<Option<i32>>,
    pub rating_counts: Vec<Option<i64>>,
}

/// Build the full time-series payload from snapshots ordered ascending by
/// collection time, with `items[i]` holding the items of `snapshots[i]`.
///
/// Snapshots are first deduplicated to one per market calendar day (the
/// latest of each day wins). The first retained day is compared against
/// itself, which yields zero deltas and no new entries; the series starts
/// flat rather than absent.
pub fn build_time_series(
    snapshots: &[Snapshot],
    items: &[Vec<ChartItem>],
    cfg: TrendConfig,
    themes: &ThemeConfig,
    country: &str,
    chart: &str,
    top_n: usize,
) -> TimeSeriesPayload {
    let (snapshots, items) = bucket_by_market_day(snapshots, items);

    let theme_names = themes.known_themes();
    let mut theme_scores: BTreeMap<String, Vec<f64>> = theme_names
        .iter()
        .map(|theme| (theme.clone(), Vec::with_capacity(snapshots.len())))
        .collect();

    let mut dates = Vec::with_capacity(snapshots.len());
    let mut rotation = Vec::with_capacity(snapshots.len());
    let mut risk_on = Vec::with_capacity(snapshots.len());
    let mut risk_off = Vec::with_capacity(snapshots.len());

    for (idx, snapshot) in snapshots.iter().enumerate() {
        let current_items = items[idx];
        let (prev_snapshot, prev_items) = if idx > 0 {
            (snapshots[idx - 1], items[idx - 1])
        } else {
            (*snapshot, current_items)
        };

        let result = analyze_trends(
            snapshot,
            prev_snapshot,
            current_items,
            prev_items,
            cfg,
            themes,
        );

        dates.push(
            snapshot
                .collected_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        rotation.push(result.rotation_index);
        risk_on.push(result.risk_on_score);
        risk_off.push(result.risk_off_score);

        for theme in &theme_names {
            let value = result.theme_scores.get(theme).copied().unwrap_or(0.0);
            if let Some(series) = theme_scores.get_mut(theme) {
                series.push(value);
            }
        }
    }

    let top_apps = build_top_apps(&items, top_n);

    TimeSeriesPayload {
        meta: TimeSeriesMeta {
            country: country.to_string(),
            chart: chart.to_string(),
            limit: snapshots.last().map_or(0, |s| s.limit),
        },
        dates,
        rotation_index: rotation,
        risk_on_score: risk_on,
        risk_off_score: risk_off,
        theme_scores,
        top_apps,
    }
}

/// Keep one snapshot per market calendar day: the latest of each day, at
/// its chronological position. Day order is preserved because the input is
/// ordered ascending.
fn bucket_by_market_day<'a>(
    snapshots: &'a [Snapshot],
    items: &'a [Vec<ChartItem>],
) -> (Vec<&'a Snapshot>, Vec<&'a Vec<ChartItem>>) {
    let mut last_index: HashMap<chrono::NaiveDate, usize> = HashMap::new();
    for (i, snapshot) in snapshots.iter().enumerate() {
        last_index.insert(market_day(snapshot.collected_at), i);
    }

    let mut out_snapshots = Vec::with_capacity(last_index.len());
    let mut out_items = Vec::with_capacity(last_index.len());
    for (i, snapshot) in snapshots.iter().enumerate() {
        if last_index.get(&market_day(snapshot.collected_at)) == Some(&i) {
            out_snapshots.push(snapshot);
            out_items.push(&items[i]);
        }
    }
    (out_snapshots, out_items)
}

/// Sparse rank/rating histories for up to `top_n` apps taken from the most
/// recent day's bucket in rank order. When fewer apps exist, all of them
/// are used.
fn build_top_apps(items: &[&Vec<ChartItem>], top_n: usize) -> Vec<TopAppSeries> {
    let Some(latest_items) = items.last() else {
        return Vec::new();
    };
    let take = top_n.min(latest_items.len());

    let item_maps: Vec<HashMap<&str, &ChartItem>> = items
        .iter()
        .map(|day| {
            day.iter()
                .map(|item| (item.app_id.as_str(), item))
                .collect()
        })
        .collect();

    latest_items[..take]
        .iter()
        .map(|app| {
            let mut ranks = Vec::with_capacity(items.len());
            let mut rating_counts = Vec::with_capacity(items.len());
            for day_map in &item_maps {
                match day_map.get(app.app_id.as_str()) {
                    Some(item) => {
                        ranks.push(Some(item.rank));
                        rating_counts.push(item.rating_count);
                    }
                    None => {
                        ranks.push(None);
                        rating_counts.push(None);
                    }
                }
            }
            TopAppSeries {
                app_id: app.app_id.clone(),
                app_name: app.app_name.clone(),
                app_url: app.app_url.clone(),
                ranks,
                rating_counts,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn snapshot(day: u32, hour: u32, limit: i32) -> Snapshot {
        Snapshot {
            id: Uuid::new_v4(),
            collected_at: Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap(),
            country: "kr".to_string(),
            chart: "top-free".to_string(),
            limit,
            source_url: "https://example.invalid/chart".to_string(),
        }
    }

    fn item(snapshot_id: Uuid, rank: i32, app_id: &str, rating_count: Option<i64>) -> ChartItem {
        ChartItem {
            snapshot_id,
            rank,
            app_id: app_id.to_string(),
            app_name: format!("App {app_id}"),
            artist_name: "Studio".to_string(),
            app_url: format!("https://example.invalid/app/{app_id}"),
            release_date: "2024-01-01".to_string(),
            genres: vec!["Games".to_string()],
            genre_ids: vec!["6014".to_string()],
            primary_genre: None,
            lookup_genres: vec![],
            rating_count,
            average_rating: None,
        }
    }

    fn series(
        snapshots: &[Snapshot],
        items: &[Vec<ChartItem>],
        top_n: usize,
    ) -> TimeSeriesPayload {
        build_time_series(
            snapshots,
            items,
            TrendConfig::default(),
            &ThemeConfig::default(),
            "kr",
            "top-free",
            top_n,
        )
    }

    #[test]
    fn same_day_snapshots_collapse_to_latest() {
        // Two snapshots on March 2 (KST): 01:00 and 05:00 UTC.
        let snapshots = vec![snapshot(1, 16, 25), snapshot(2, 1, 25), snapshot(2, 5, 25)];
        let items = vec![
            vec![item(snapshots[0].id, 1, "A", None)],
            vec![item(snapshots[1].id, 1, "B", None)],
            vec![item(snapshots[2].id, 1, "C", None)],
        ];

        let payload = series(&snapshots, &items, 10);

        // March 1 16:00 UTC is already March 2 KST, so all three share one day.
        assert_eq!(payload.dates.len(), 1);
        assert_eq!(payload.top_apps[0].app_id, "C");
    }

    #[test]
    fn day_bucketing_is_idempotent() {
        let snapshots = vec![snapshot(1, 6, 25), snapshot(2, 6, 25), snapshot(3, 6, 25)];
        let items: Vec<Vec<ChartItem>> = snapshots
            .iter()
            .enumerate()
            .map(|(i, s)| vec![item(s.id, 1, &format!("A{i}"), Some(10))])
            .collect();

        let first = series(&snapshots, &items, 5);
        // Input already has one snapshot per day, so re-running over the
        // same data must not change anything.
        let second = series(&snapshots, &items, 5);
        assert_eq!(first.dates, second.dates);
        assert_eq!(first.rotation_index, second.rotation_index);
        assert_eq!(first.dates.len(), 3);
    }

    #[test]
    fn first_day_has_zero_scores_and_series_aligns() {
        let snapshots = vec![snapshot(1, 6, 2), snapshot(2, 6, 2)];
        let day1 = vec![
            item(snapshots[0].id, 1, "A", Some(100)),
            item(snapshots[0].id, 2, "B", Some(50)),
        ];
        let day2 = vec![
            item(snapshots[1].id, 1, "B", Some(80)),
            item(snapshots[1].id, 2, "C", Some(10)),
        ];
        let items = vec![day1, day2];

        let payload = series(&snapshots, &items, 10);

        assert_eq!(payload.dates.len(), 2);
        assert_eq!(payload.rotation_index.len(), 2);
        assert_eq!(payload.risk_on_score.len(), 2);
        assert_eq!(payload.risk_off_score.len(), 2);
        // Self transition: zero deltas everywhere, so all aggregates are 0.
        assert_eq!(payload.rotation_index[0], 0.0);
        for series in payload.theme_scores.values() {
            assert_eq!(series.len(), 2);
        }
    }

    #[test]
    fn theme_series_cover_all_known_themes_with_zero_fill() {
        let snapshots = vec![snapshot(1, 6, 5)];
        let items = vec![vec![item(snapshots[0].id, 1, "G", Some(10))]];

        let payload = series(&snapshots, &items, 10);

        let expected = ThemeConfig::default().known_themes();
        let keys: Vec<String> = payload.theme_scores.keys().cloned().collect();
        assert_eq!(keys, expected);
        // Only "games" charted; every other theme is zero-filled.
        assert_eq!(payload.theme_scores["finance"], vec![0.0]);
    }

    #[test]
    fn top_n_is_truncated_to_available_apps() {
        let snapshots = vec![snapshot(1, 6, 25)];
        let items = vec![vec![
            item(snapshots[0].id, 1, "A", None),
            item(snapshots[0].id, 2, "B", None),
            item(snapshots[0].id, 3, "C", None),
        ]];

        let payload = series(&snapshots, &items, 5);
        assert_eq!(payload.top_apps.len(), 3);
        // Rank order of the latest day is preserved.
        let ids: Vec<&str> = payload.top_apps.iter().map(|a| a.app_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn top_app_history_is_sparse_but_aligned() {
        let snapshots = vec![snapshot(1, 6, 2), snapshot(2, 6, 2)];
        let day1 = vec![item(snapshots[0].id, 1, "A", Some(100))];
        let day2 = vec![
            item(snapshots[1].id, 1, "B", Some(80)),
            item(snapshots[1].id, 2, "A", None),
        ];
        let items = vec![day1, day2];

        let payload = series(&snapshots, &items, 2);

        let b = payload.top_apps.iter().find(|a| a.app_id == "B").unwrap();
        assert_eq!(b.ranks, vec![None, Some(1)]);
        assert_eq!(b.rating_counts, vec![None, Some(80)]);

        let a = payload.top_apps.iter().find(|a| a.app_id == "A").unwrap();
        assert_eq!(a.ranks, vec![Some(1), Some(2)]);
        assert_eq!(a.rating_counts, vec![Some(100), None]);
    }

    #[test]
    fn empty_input_yields_empty_payload() {
        let payload = series(&[], &[], 10);
        assert!(payload.dates.is_empty());
        assert!(payload.top_apps.is_empty());
        assert_eq!(payload.meta.limit, 0);
    }

    #[test]
    fn dates_are_rfc3339_utc() {
        let snapshots = vec![snapshot(1, 6, 25)];
        let items = vec![vec![item(snapshots[0].id, 1, "A", None)]];
        let payload = series(&snapshots, &items, 1);
        assert_eq!(payload.dates, vec!["2026-03-01T06:00:00Z".to_string()]);
    }
}
