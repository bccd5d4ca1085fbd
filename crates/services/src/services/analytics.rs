//! Read-only aggregates for the admin dashboard.
//!
//! Queries fetch raw counts and timestamps; bucketing happens in the pure
//! functions below so it can be tested without a database.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use db::{
    DBService,
    models::{
        report::{Report, ReportCategory, ReportPriority, ReportStatus},
        team::Team,
    },
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub const MAX_TREND_DAYS: u32 = 365;
pub const DEFAULT_TREND_DAYS: u32 = 30;
pub const MAX_HEATMAP_PRECISION: u32 = 4;
pub const DEFAULT_HEATMAP_PRECISION: u32 = 2;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct AnalyticsSummary {
    pub total: i64,
    pub open: i64,
    pub resolved: i64,
    pub escalated: i64,
    pub resolution_rate: f64,
    pub avg_resolution_hours: Option<f64>,
    pub by_status: HashMap<ReportStatus, i64>,
    pub by_category: HashMap<ReportCategory, i64>,
    pub by_priority: HashMap<ReportPriority, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub created: i64,
    pub resolved: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct HeatmapCell {
    pub latitude: f64,
    pub longitude: f64,
    pub count: i64,
    pub weight: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct TeamPerformance {
    pub team_id: Uuid,
    pub name: String,
    pub capacity: i64,
    pub current_load: i64,
    pub utilization: f64,
    pub total_assigned: i64,
    pub active: i64,
    pub resolved: i64,
}

#[derive(Clone)]
pub struct AnalyticsService {
    db: DBService,
}

impl AnalyticsService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    pub async fn summary(&self) -> Result<AnalyticsSummary, AnalyticsError> {
        let pool = &self.db.pool;
        Ok(summarize(
            &Report::count_by_status(pool).await?,
            &Report::count_by_category(pool).await?,
            &Report::count_by_priority(pool).await?,
            &Report::resolution_times(pool).await?,
            Report::count_escalated(pool).await?,
        ))
    }

    pub async fn trends(&self, days: Option<u32>) -> Result<Vec<TrendPoint>, AnalyticsError> {
        let days = days.unwrap_or(DEFAULT_TREND_DAYS).clamp(1, MAX_TREND_DAYS);
        let today = Utc::now().date_naive();
        let since = window_start(today, days);
        let created = Report::created_since(&self.db.pool, since).await?;
        let resolved = Report::resolved_since(&self.db.pool, since).await?;
        Ok(daily_buckets(today, days, &created, &resolved))
    }

    pub async fn heatmap(
        &self,
        precision: Option<u32>,
        status: Option<ReportStatus>,
    ) -> Result<Vec<HeatmapCell>, AnalyticsError> {
        let precision = precision
            .unwrap_or(DEFAULT_HEATMAP_PRECISION)
            .min(MAX_HEATMAP_PRECISION);
        let points = Report::geo_points(&self.db.pool, status).await?;
        Ok(grid_cells(&points, precision))
    }

    pub async fn team_performance(&self) -> Result<Vec<TeamPerformance>, AnalyticsError> {
        let teams = Team::find_all(&self.db.pool).await?;
        let counts = Report::count_by_team_and_status(&self.db.pool).await?;
        Ok(team_rows(teams, &counts))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn zero_filled<K>(counts: &[(K, i64)]) -> HashMap<K, i64>
where
    K: IntoEnumIterator + Copy + Eq + std::hash::Hash,
{
    let mut map: HashMap<K, i64> = K::iter().map(|k| (k, 0)).collect();
    for (key, count) in counts {
        *map.entry(*key).or_default() += count;
    }
    map
}

pub fn summarize(
    by_status: &[(ReportStatus, i64)],
    by_category: &[(ReportCategory, i64)],
    by_priority: &[(ReportPriority, i64)],
    resolution_times: &[(DateTime<Utc>, DateTime<Utc>)],
    escalated: i64,
) -> AnalyticsSummary {
    let by_status = zero_filled(by_status);
    let total: i64 = by_status.values().sum();
    let count_where = |pred: fn(ReportStatus) -> bool| -> i64 {
        by_status
            .iter()
            .filter(|(status, _)| pred(**status))
            .map(|(_, count)| count)
            .sum()
    };
    let open = count_where(ReportStatus::is_open);
    let resolved = count_where(|s| matches!(s, ReportStatus::Resolved | ReportStatus::Closed));

    let resolution_rate = if total == 0 {
        0.0
    } else {
        round2(resolved as f64 / total as f64)
    };
    let avg_resolution_hours = if resolution_times.is_empty() {
        None
    } else {
        let total_secs: i64 = resolution_times
            .iter()
            .map(|(created, resolved)| (*resolved - *created).num_seconds().max(0))
            .sum();
        Some(round2(
            total_secs as f64 / 3600.0 / resolution_times.len() as f64,
        ))
    };

    AnalyticsSummary {
        total,
        open,
        resolved,
        escalated,
        resolution_rate,
        avg_resolution_hours,
        by_status,
        by_category: zero_filled(by_category),
        by_priority: zero_filled(by_priority),
    }
}

/// Midnight UTC of the first day in a `days`-long window ending `today`.
fn window_start(today: NaiveDate, days: u32) -> DateTime<Utc> {
    let first = today - Duration::days(i64::from(days) - 1);
    first.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

/// One bucket per day, oldest first, ending with `today`. Timestamps outside
/// the window are ignored.
pub fn daily_buckets(
    today: NaiveDate,
    days: u32,
    created: &[DateTime<Utc>],
    resolved: &[DateTime<Utc>],
) -> Vec<TrendPoint> {
    let days = days.clamp(1, MAX_TREND_DAYS);
    let first = today - Duration::days(i64::from(days) - 1);
    let mut points: Vec<TrendPoint> = (0..i64::from(days))
        .map(|offset| TrendPoint {
            date: first + Duration::days(offset),
            created: 0,
            resolved: 0,
        })
        .collect();

    let slot = |ts: &DateTime<Utc>| -> Option<usize> {
        let offset = (ts.date_naive() - first).num_days();
        (0..i64::from(days))
            .contains(&offset)
            .then_some(offset as usize)
    };
    for ts in created {
        if let Some(i) = slot(ts) {
            points[i].created += 1;
        }
    }
    for ts in resolved {
        if let Some(i) = slot(ts) {
            points[i].resolved += 1;
        }
    }
    points
}

/// Groups points into cells by rounding coordinates to `precision` decimals.
/// Busiest cells first.
pub fn grid_cells(points: &[(f64, f64, ReportPriority)], precision: u32) -> Vec<HeatmapCell> {
    let scale = 10f64.powi(precision.min(MAX_HEATMAP_PRECISION) as i32);
    let mut cells: HashMap<(i64, i64), (i64, i64)> = HashMap::new();
    for (lat, lng, priority) in points {
        let key = ((lat * scale).round() as i64, (lng * scale).round() as i64);
        let cell = cells.entry(key).or_default();
        cell.0 += 1;
        cell.1 += i64::from(priority.weight());
    }

    let mut cells: Vec<HeatmapCell> = cells
        .into_iter()
        .map(|((lat, lng), (count, weight))| HeatmapCell {
            latitude: lat as f64 / scale,
            longitude: lng as f64 / scale,
            count,
            weight,
        })
        .collect();
    cells.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(b.weight.cmp(&a.weight))
            .then(a.latitude.total_cmp(&b.latitude))
            .then(a.longitude.total_cmp(&b.longitude))
    });
    cells
}

pub fn team_rows(teams: Vec<Team>, counts: &[(Uuid, ReportStatus, i64)]) -> Vec<TeamPerformance> {
    teams
        .into_iter()
        .map(|team| {
            let mine = counts.iter().filter(|(id, _, _)| *id == team.id);
            let mut row = TeamPerformance {
                team_id: team.id,
                utilization: round2(team.utilization()),
                name: team.name,
                capacity: team.capacity,
                current_load: team.current_load,
                total_assigned: 0,
                active: 0,
                resolved: 0,
            };
            for (_, status, count) in mine {
                row.total_assigned += count;
                if status.holds_team_slot() {
                    row.active += count;
                }
                if matches!(status, ReportStatus::Resolved | ReportStatus::Closed) {
                    row.resolved += count;
                }
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn summary_counts_open_and_resolved() {
        let summary = summarize(
            &[
                (ReportStatus::Submitted, 3),
                (ReportStatus::InProgress, 1),
                (ReportStatus::Resolved, 2),
                (ReportStatus::Closed, 1),
                (ReportStatus::Rejected, 1),
            ],
            &[(ReportCategory::Pothole, 8)],
            &[(ReportPriority::High, 8)],
            &[
                (at(2024, 5, 1, 0), at(2024, 5, 1, 10)),
                (at(2024, 5, 1, 0), at(2024, 5, 2, 6)),
            ],
            2,
        );
        assert_eq!(summary.total, 8);
        assert_eq!(summary.open, 4);
        assert_eq!(summary.resolved, 3);
        assert_eq!(summary.resolution_rate, 0.38);
        assert_eq!(summary.avg_resolution_hours, Some(20.0));
        assert_eq!(summary.by_status[&ReportStatus::Acknowledged], 0);
        assert_eq!(summary.by_category[&ReportCategory::Other], 0);
        assert_eq!(summary.by_category[&ReportCategory::Pothole], 8);
    }

    #[test]
    fn empty_summary_has_no_average() {
        let summary = summarize(&[], &[], &[], &[], 0);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.resolution_rate, 0.0);
        assert_eq!(summary.avg_resolution_hours, None);
    }

    #[test]
    fn trend_buckets_are_zero_filled_and_windowed() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let points = daily_buckets(
            today,
            3,
            &[at(2024, 5, 8, 1), at(2024, 5, 10, 23), at(2024, 5, 10, 0), at(2024, 5, 1, 0)],
            &[at(2024, 5, 9, 12)],
        );
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 5, 8).unwrap());
        assert_eq!(points[0].created, 1);
        assert_eq!(points[1].created, 0);
        assert_eq!(points[1].resolved, 1);
        assert_eq!(points[2].created, 2);
        assert_eq!(points[2].date, today);
    }

    #[test]
    fn trend_days_are_clamped() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        assert_eq!(daily_buckets(today, 0, &[], &[]).len(), 1);
        assert_eq!(daily_buckets(today, 10_000, &[], &[]).len(), 365);
    }

    #[test]
    fn heatmap_groups_by_rounded_coordinates() {
        let cells = grid_cells(
            &[
                (12.971_6, 77.594_6, ReportPriority::Low),
                (12.968_1, 77.591_2, ReportPriority::Critical),
                (13.5, 77.0, ReportPriority::High),
                (13.5, 77.0, ReportPriority::High),
            ],
            2,
        );
        assert_eq!(cells.len(), 2);
        // equal counts, heavier cell first
        assert_eq!(cells[0].weight, 6);
        assert_eq!(cells[0].latitude, 13.5);
        assert_eq!(cells[1].count, 2);
        assert_eq!(cells[1].weight, 5);
        assert_eq!(cells[1].latitude, 12.97);
        assert_eq!(cells[1].longitude, 77.59);
    }

    #[test]
    fn coarse_precision_merges_cells() {
        let cells = grid_cells(
            &[
                (12.4, 77.4, ReportPriority::Medium),
                (11.6, 76.6, ReportPriority::Medium),
            ],
            0,
        );
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].latitude, 12.0);
        assert_eq!(cells[0].count, 2);
    }

    #[test]
    fn team_rows_split_active_and_resolved() {
        let now = Utc::now();
        let team = Team {
            id: Uuid::new_v4(),
            name: "Roads".to_string(),
            department: None,
            contact_email: None,
            capacity: 4,
            current_load: 3,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let other = Uuid::new_v4();
        let rows = team_rows(
            vec![team.clone()],
            &[
                (team.id, ReportStatus::Assigned, 2),
                (team.id, ReportStatus::InProgress, 1),
                (team.id, ReportStatus::Closed, 4),
                (other, ReportStatus::Assigned, 9),
            ],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_assigned, 7);
        assert_eq!(rows[0].active, 3);
        assert_eq!(rows[0].resolved, 4);
        assert_eq!(rows[0].utilization, 0.75);
    }

    #[tokio::test]
    async fn service_reads_from_database() {
        let db = DBService::new_in_memory().await.unwrap();
        let analytics = AnalyticsService::new(db);
        let summary = analytics.summary().await.unwrap();
        assert_eq!(summary.total, 0);
        let trends = analytics.trends(Some(7)).await.unwrap();
        assert_eq!(trends.len(), 7);
        assert!(analytics.heatmap(None, None).await.unwrap().is_empty());
        assert!(analytics.team_performance().await.unwrap().is_empty());
    }
}
