//! Regional purchase popularity.
//!
//! Everything here is a pure function over purchase line items: callers load
//! the lines and regions from the database and hand them over.

use std::collections::{BTreeMap, HashMap};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::db::{LineItem, Region};

pub const UNASSIGNED_CODE: &str = "unassigned";
pub const UNASSIGNED_NAME: &str = "Unassigned";

const HISTORY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieTotal {
    pub movie_id: i64,
    pub name: String,
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionStats {
    pub top_movies: Vec<MovieTotal>,
    /// Sum over `top_movies` only, not every purchase in the region.
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub lat: f64,
    pub lng: f64,
}

impl From<&Region> for RegionInfo {
    fn from(region: &Region) -> Self {
        Self {
            id: region.id,
            name: region.name.clone(),
            code: region.code.clone(),
            lat: region.center_lat,
            lng: region.center_lng,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseEntry {
    pub movie_id: i64,
    pub movie_name: String,
    pub quantity: i64,
    pub region_code: String,
    pub region_name: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularityDashboard {
    pub regions: Vec<RegionInfo>,
    /// Keyed by region code.
    pub region_stats: BTreeMap<String, RegionStats>,
    pub trending: Vec<MovieTotal>,
    pub history: Vec<PurchaseEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_region_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub top_n: usize,
    pub history_limit: usize,
    pub offset: FixedOffset,
}

/// Sums quantities per movie and returns the `limit` best sellers.
///
/// Ordered by total descending; equal totals are ordered by movie id.
pub fn top_movies<'a, I>(items: I, limit: usize) -> Vec<MovieTotal>
where
    I: IntoIterator<Item = &'a LineItem>,
{
    let mut totals: HashMap<i64, MovieTotal> = HashMap::new();
    for item in items {
        let entry = totals
            .entry(item.movie_id)
            .or_insert_with(|| MovieTotal {
                movie_id: item.movie_id,
                name: item.movie_name.clone(),
                total: 0,
            });
        entry.total = entry.total.saturating_add(item.quantity);
    }

    let mut ranked: Vec<MovieTotal> = totals.into_values().collect();
    ranked.sort_by(|a, b| b.total.cmp(&a.total).then(a.movie_id.cmp(&b.movie_id)));
    ranked.truncate(limit);
    ranked
}

pub fn region_stats(items: &[LineItem], region_id: i64, limit: usize) -> RegionStats {
    let top_movies = top_movies(
        items.iter().filter(|item| item.region_id == Some(region_id)),
        limit,
    );
    let total = top_movies
        .iter()
        .fold(0i64, |sum, m| sum.saturating_add(m.total));
    RegionStats { top_movies, total }
}

/// Most recent purchases of one user, newest first.
pub fn purchase_history(
    items: &[LineItem],
    user_id: &str,
    limit: usize,
    offset: &FixedOffset,
) -> Vec<PurchaseEntry> {
    let mut mine: Vec<&LineItem> = items.iter().filter(|item| item.user_id == user_id).collect();
    mine.sort_by(|a, b| b.order_date.cmp(&a.order_date).then(b.id.cmp(&a.id)));

    mine.into_iter()
        .take(limit)
        .map(|item| PurchaseEntry {
            movie_id: item.movie_id,
            movie_name: item.movie_name.clone(),
            quantity: item.quantity,
            region_code: item
                .region_code
                .clone()
                .unwrap_or_else(|| UNASSIGNED_CODE.to_string()),
            region_name: item
                .region_name
                .clone()
                .unwrap_or_else(|| UNASSIGNED_NAME.to_string()),
            date: item
                .order_date
                .with_timezone(offset)
                .format(HISTORY_DATE_FORMAT)
                .to_string(),
        })
        .collect()
}

pub fn build_dashboard(
    regions: &[Region],
    items: &[LineItem],
    user_id: Option<&str>,
    user_region_code: Option<String>,
    options: &DashboardOptions,
) -> PopularityDashboard {
    let region_stats = regions
        .iter()
        .map(|region| {
            (
                region.code.clone(),
                region_stats(items, region.id, options.top_n),
            )
        })
        .collect();

    let history = match user_id {
        Some(user_id) => purchase_history(items, user_id, options.history_limit, &options.offset),
        None => Vec::new(),
    };

    PopularityDashboard {
        regions: regions.iter().map(RegionInfo::from).collect(),
        region_stats,
        trending: top_movies(items, options.top_n),
        history,
        user_region_code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn region(id: i64, code: &str) -> Region {
        Region {
            id,
            name: format!("Region {}", code),
            code: code.to_string(),
            center_lat: 0.0,
            center_lng: 0.0,
        }
    }

    fn base_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn line(id: i64, movie_id: i64, quantity: i64, region: Option<&Region>, user: &str) -> LineItem {
        LineItem {
            id,
            movie_id,
            movie_name: format!("Movie {}", movie_id),
            quantity,
            region_id: region.map(|r| r.id),
            region_code: region.map(|r| r.code.clone()),
            region_name: region.map(|r| r.name.clone()),
            order_date: base_date() + Duration::minutes(id),
            user_id: user.to_string(),
        }
    }

    fn options() -> DashboardOptions {
        DashboardOptions {
            top_n: 5,
            history_limit: 15,
            offset: FixedOffset::east_opt(0).unwrap(),
        }
    }

    fn totals(list: &[MovieTotal]) -> Vec<(i64, i64)> {
        list.iter().map(|m| (m.movie_id, m.total)).collect()
    }

    #[test]
    fn test_worked_example() {
        let r1 = region(1, "r1");
        let r2 = region(2, "r2");
        let (a, b) = (1, 2);
        let items = vec![
            line(1, a, 3, Some(&r1), "u"),
            line(2, b, 5, Some(&r1), "u"),
            line(3, a, 2, Some(&r2), "u"),
        ];

        let dashboard = build_dashboard(&[r1, r2], &items, None, None, &options());

        let s1 = &dashboard.region_stats["r1"];
        assert_eq!(totals(&s1.top_movies), vec![(b, 5), (a, 3)]);
        assert_eq!(s1.total, 8);

        let s2 = &dashboard.region_stats["r2"];
        assert_eq!(totals(&s2.top_movies), vec![(a, 2)]);
        assert_eq!(s2.total, 2);

        assert_eq!(totals(&dashboard.trending), vec![(a, 5), (b, 5)]);
    }

    #[test]
    fn test_empty_input() {
        let regions = vec![region(1, "r1")];
        let dashboard = build_dashboard(&regions, &[], Some("u"), None, &options());
        assert_eq!(dashboard.regions.len(), 1);
        assert_eq!(dashboard.region_stats["r1"], RegionStats::default());
        assert!(dashboard.trending.is_empty());
        assert!(dashboard.history.is_empty());
        assert!(dashboard.user_region_code.is_none());
    }

    #[test]
    fn test_region_total_counts_only_top_entries() {
        let r1 = region(1, "r1");
        let items: Vec<LineItem> = (1..=7).map(|m| line(m, m, m, Some(&r1), "u")).collect();

        let stats = region_stats(&items, r1.id, 5);
        assert_eq!(totals(&stats.top_movies), vec![(7, 7), (6, 6), (5, 5), (4, 4), (3, 3)]);
        assert_eq!(stats.total, 25);
    }

    #[test]
    fn test_huge_quantities_saturate() {
        let r1 = region(1, "r1");
        let big = i64::MAX / 2 + 1;
        let items = vec![
            line(1, 1, big, Some(&r1), "u"),
            line(2, 1, big, Some(&r1), "u"),
            line(3, 2, big, Some(&r1), "u"),
        ];

        assert_eq!(totals(&top_movies(&items, 5)), vec![(1, i64::MAX), (2, big)]);
        assert_eq!(region_stats(&items, r1.id, 5).total, i64::MAX);
    }

    #[test]
    fn test_region_totals_match_brute_force() {
        let regions: Vec<Region> = (1..=3).map(|i| region(i, &format!("r{}", i))).collect();
        let mut items = Vec::new();
        let mut seed: u64 = 42;
        for id in 1..=300 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let movie = (seed >> 33) as i64 % 9 + 1;
            let quantity = (seed >> 20) as i64 % 4 + 1;
            let slot = (seed >> 40) as usize % 4;
            let region = regions.get(slot);
            items.push(line(id, movie, quantity, region, "u"));
        }

        let dashboard = build_dashboard(&regions, &items, None, None, &options());

        for r in &regions {
            let stats = &dashboard.region_stats[&r.code];
            let distinct: std::collections::HashSet<i64> = items
                .iter()
                .filter(|i| i.region_id == Some(r.id))
                .map(|i| i.movie_id)
                .collect();
            assert_eq!(stats.top_movies.len(), distinct.len().min(5));

            for entry in &stats.top_movies {
                let brute: i64 = items
                    .iter()
                    .filter(|i| i.region_id == Some(r.id) && i.movie_id == entry.movie_id)
                    .map(|i| i.quantity)
                    .sum();
                assert_eq!(entry.total, brute);
            }
            assert_eq!(stats.total, stats.top_movies.iter().map(|m| m.total).sum::<i64>());
            assert!(stats.top_movies.windows(2).all(|w| w[0].total >= w[1].total));
        }

        for entry in &dashboard.trending {
            let brute: i64 = items
                .iter()
                .filter(|i| i.movie_id == entry.movie_id)
                .map(|i| i.quantity)
                .sum();
            assert_eq!(entry.total, brute);
        }
    }

    #[test]
    fn test_trending_includes_unassigned_purchases() {
        let r1 = region(1, "r1");
        let items = vec![line(1, 1, 2, Some(&r1), "u"), line(2, 2, 10, None, "u")];
        let dashboard = build_dashboard(&[r1], &items, None, None, &options());
        assert_eq!(totals(&dashboard.trending), vec![(2, 10), (1, 2)]);
        assert_eq!(totals(&dashboard.region_stats["r1"].top_movies), vec![(1, 2)]);
    }

    #[test]
    fn test_history_is_limited_and_newest_first() {
        let r1 = region(1, "r1");
        let mut items: Vec<LineItem> = (1..=20).map(|id| line(id, id, 1, Some(&r1), "alice")).collect();
        items.push(line(21, 1, 1, Some(&r1), "bob"));

        let history = purchase_history(&items, "alice", 15, &FixedOffset::east_opt(0).unwrap());
        assert_eq!(history.len(), 15);
        assert_eq!(history[0].movie_id, 20);
        assert_eq!(history[14].movie_id, 6);
        assert!(history.windows(2).all(|w| w[0].date >= w[1].date));
    }

    #[test]
    fn test_history_labels_and_local_time() {
        let r1 = region(1, "r1");
        let items = vec![line(1, 1, 2, None, "alice"), line(2, 2, 1, Some(&r1), "alice")];
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();

        let history = purchase_history(&items, "alice", 15, &offset);
        assert_eq!(history[0].region_code, "r1");
        assert_eq!(history[0].region_name, "Region r1");
        assert_eq!(history[0].date, "2024-05-01 05:02");
        assert_eq!(history[1].region_code, UNASSIGNED_CODE);
        assert_eq!(history[1].region_name, UNASSIGNED_NAME);
        assert_eq!(history[1].date, "2024-05-01 05:01");
    }

    #[test]
    fn test_dashboard_carries_user_region() {
        let r1 = region(1, "r1");
        let items = vec![line(1, 1, 2, Some(&r1), "alice")];
        let dashboard = build_dashboard(
            &[r1],
            &items,
            Some("alice"),
            Some("r1".to_string()),
            &options(),
        );
        assert_eq!(dashboard.user_region_code.as_deref(), Some("r1"));
        assert_eq!(dashboard.history.len(), 1);
    }
}
