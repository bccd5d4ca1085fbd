use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use uuid::Uuid;

macro_rules! report_columns {
    () => {
        "id, tracking_id, description, status, priority, category, latitude, longitude, address, media_url, reporter_name, reporter_contact, assigned_to, ai_category, ai_confidence, escalated, created_at, updated_at, resolved_at"
    };
}

macro_rules! select_reports {
    ($tail:literal) => {
        concat!("SELECT ", report_columns!(), " FROM reports ", $tail)
    };
}

macro_rules! returning_report {
    ($head:literal) => {
        concat!($head, " RETURNING ", report_columns!())
    };
}

#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    TS,
    EnumString,
    Display,
    EnumIter,
    Default,
)]
#[sqlx(type_name = "report_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Submitted,
    Acknowledged,
    Assigned,
    InProgress,
    Resolved,
    Closed,
    Rejected,
}

impl ReportStatus {
    /// Every status reachable in one step, including the moves that only the
    /// assign/unassign operations may perform.
    pub fn successors(self) -> &'static [ReportStatus] {
        use ReportStatus::*;
        match self {
            Submitted => &[Acknowledged, Assigned, Rejected],
            Acknowledged => &[Assigned, Rejected],
            Assigned => &[InProgress, Acknowledged, Resolved, Rejected],
            InProgress => &[Resolved, Assigned, Rejected],
            Resolved => &[Closed, InProgress],
            Closed | Rejected => &[],
        }
    }

    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        self.successors().contains(&next)
    }

    /// A report in one of these states occupies one unit of its team's capacity.
    pub fn holds_team_slot(self) -> bool {
        matches!(self, ReportStatus::Assigned | ReportStatus::InProgress)
    }

    pub fn is_open(self) -> bool {
        !matches!(
            self,
            ReportStatus::Resolved | ReportStatus::Closed | ReportStatus::Rejected
        )
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    TS,
    EnumString,
    Display,
    EnumIter,
    Default,
)]
#[sqlx(type_name = "report_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl ReportPriority {
    /// Heatmap weight.
    pub fn weight(self) -> u32 {
        match self {
            ReportPriority::Low => 1,
            ReportPriority::Medium => 2,
            ReportPriority::High => 3,
            ReportPriority::Critical => 4,
        }
    }

    /// One level up, saturating at critical.
    pub fn raised(self) -> ReportPriority {
        match self {
            ReportPriority::Low => ReportPriority::Medium,
            ReportPriority::Medium => ReportPriority::High,
            ReportPriority::High | ReportPriority::Critical => ReportPriority::Critical,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    TS,
    EnumString,
    Display,
    EnumIter,
    Default,
)]
#[sqlx(type_name = "report_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportCategory {
    Pothole,
    Streetlight,
    Garbage,
    Water,
    Sewage,
    Traffic,
    Vandalism,
    #[default]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct GeoLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Report {
    pub id: Uuid,
    pub tracking_id: String,
    pub description: String,
    pub status: ReportStatus,
    pub priority: ReportPriority,
    pub category: ReportCategory,
    #[sqlx(flatten)]
    pub location: GeoLocation,
    pub media_url: Option<String>,
    pub reporter_name: Option<String>,
    pub reporter_contact: Option<String>,
    pub assigned_to: Option<Uuid>, // Foreign key to Team
    pub ai_category: Option<ReportCategory>,
    pub ai_confidence: Option<f64>,
    pub escalated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Report {
    /// Team currently charged for this report, if any.
    pub fn slot_holder(&self) -> Option<Uuid> {
        self.assigned_to.filter(|_| self.status.holds_team_slot())
    }
}

/// Citizen-facing submission payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateReport {
    pub description: String,
    pub category: Option<ReportCategory>,
    pub priority: Option<ReportPriority>,
    pub location: Option<GeoLocation>,
    pub media_url: Option<String>,
    pub reporter_name: Option<String>,
    pub reporter_contact: Option<String>,
}

/// Fully resolved values for a new row.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub tracking_id: String,
    pub description: String,
    pub category: ReportCategory,
    pub priority: ReportPriority,
    pub location: GeoLocation,
    pub media_url: Option<String>,
    pub reporter_name: Option<String>,
    pub reporter_contact: Option<String>,
    pub ai_category: Option<ReportCategory>,
    pub ai_confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub priority: Option<ReportPriority>,
    pub category: Option<ReportCategory>,
    pub team_id: Option<Uuid>,
    pub q: Option<String>,
}

impl ReportFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(priority) = self.priority {
            qb.push(" AND priority = ").push_bind(priority);
        }
        if let Some(category) = self.category {
            qb.push(" AND category = ").push_bind(category);
        }
        if let Some(team_id) = self.team_id {
            qb.push(" AND assigned_to = ").push_bind(team_id);
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", escape_like(q));
            qb.push(" AND (description LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR tracking_id LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
    }
}

/// Escapes `LIKE` wildcards so user input matches literally (`ESCAPE '\'`).
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Workflow-owned columns written together on every status or assignment change.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowState {
    pub status: ReportStatus,
    pub assigned_to: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Report {
    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        data: &NewReport,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Report>(returning_report!(
            r#"INSERT INTO reports (id, tracking_id, description, status, priority, category, latitude, longitude, address, media_url, reporter_name, reporter_contact, ai_category, ai_confidence, escalated, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 0, $15, $15)"#
        ))
        .bind(id)
        .bind(data.tracking_id.clone())
        .bind(data.description.clone())
        .bind(ReportStatus::Submitted)
        .bind(data.priority)
        .bind(data.category)
        .bind(data.location.latitude)
        .bind(data.location.longitude)
        .bind(data.location.address.clone())
        .bind(data.media_url.clone())
        .bind(data.reporter_name.clone())
        .bind(data.reporter_contact.clone())
        .bind(data.ai_category)
        .bind(data.ai_confidence)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Report>(select_reports!("WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_tracking_id<'e, E>(
        executor: E,
        tracking_id: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Report>(select_reports!("WHERE tracking_id = $1"))
            .bind(tracking_id.to_string())
            .fetch_optional(executor)
            .await
    }

    /// Highest tracking id matching a `LIKE` day pattern.
    pub async fn latest_tracking_id_like<'e, E>(
        executor: E,
        pattern: &str,
    ) -> Result<Option<String>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, String>(
            "SELECT tracking_id FROM reports WHERE tracking_id LIKE $1 ORDER BY tracking_id DESC LIMIT 1",
        )
        .bind(pattern.to_string())
        .fetch_optional(executor)
        .await
    }

    pub async fn list(
        pool: &SqlitePool,
        filter: &ReportFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(select_reports!(""));
        filter.push_where(&mut qb);
        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        qb.build_query_as::<Report>().fetch_all(pool).await
    }

    pub async fn count(pool: &SqlitePool, filter: &ReportFilter) -> Result<i64, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM reports");
        filter.push_where(&mut qb);
        qb.build_query_scalar::<i64>().fetch_one(pool).await
    }

    pub async fn update_workflow_state<'e, E>(
        executor: E,
        id: Uuid,
        state: WorkflowState,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Report>(returning_report!(
            r#"UPDATE reports
               SET status = $2, assigned_to = $3, resolved_at = $4, updated_at = $5
               WHERE id = $1"#
        ))
        .bind(id)
        .bind(state.status)
        .bind(state.assigned_to)
        .bind(state.resolved_at)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn update_priority<'e, E>(
        executor: E,
        id: Uuid,
        priority: ReportPriority,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Report>(returning_report!(
            r#"UPDATE reports SET priority = $2, updated_at = $3
               WHERE id = $1"#
        ))
        .bind(id)
        .bind(priority)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn touch<'e, E>(executor: E, id: Uuid, now: DateTime<Utc>) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE reports SET updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Raises priority and flags the report; returns None if it was already
    /// escalated or has left triage.
    pub async fn mark_escalated<'e, E>(
        executor: E,
        id: Uuid,
        priority: ReportPriority,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Report>(returning_report!(
            r#"UPDATE reports SET priority = $2, escalated = 1, updated_at = $3
               WHERE id = $1 AND escalated = 0 AND status IN ('submitted', 'acknowledged')"#
        ))
        .bind(id)
        .bind(priority)
        .bind(now)
        .fetch_optional(executor)
        .await
    }

    /// Reports still waiting for triage that were created before `cutoff`.
    pub async fn find_stale(
        pool: &SqlitePool,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(select_reports!(
            "WHERE status IN ('submitted', 'acknowledged') AND escalated = 0 AND created_at < $1 ORDER BY created_at ASC"
        ))
        .bind(cutoff)
        .fetch_all(pool)
        .await
    }

    /// Detaches every report from a team that is being deleted.
    pub async fn clear_team<'e, E>(executor: E, team_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE reports SET assigned_to = NULL WHERE assigned_to = $1")
            .bind(team_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_holding_slot<'e, E>(executor: E, team_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reports WHERE assigned_to = $1 AND status IN ('assigned', 'in_progress')",
        )
        .bind(team_id)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_by_status(
        pool: &SqlitePool,
    ) -> Result<Vec<(ReportStatus, i64)>, sqlx::Error> {
        sqlx::query_as("SELECT status, COUNT(*) FROM reports GROUP BY status")
            .fetch_all(pool)
            .await
    }

    pub async fn count_by_category(
        pool: &SqlitePool,
    ) -> Result<Vec<(ReportCategory, i64)>, sqlx::Error> {
        sqlx::query_as("SELECT category, COUNT(*) FROM reports GROUP BY category")
            .fetch_all(pool)
            .await
    }

    pub async fn count_by_priority(
        pool: &SqlitePool,
    ) -> Result<Vec<(ReportPriority, i64)>, sqlx::Error> {
        sqlx::query_as("SELECT priority, COUNT(*) FROM reports GROUP BY priority")
            .fetch_all(pool)
            .await
    }

    pub async fn count_escalated(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE escalated = 1")
            .fetch_one(pool)
            .await
    }

    /// `(created_at, resolved_at)` for every report that has been resolved.
    pub async fn resolution_times(
        pool: &SqlitePool,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT created_at, resolved_at FROM reports WHERE resolved_at IS NOT NULL",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn created_since(
        pool: &SqlitePool,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, sqlx::Error> {
        sqlx::query_scalar("SELECT created_at FROM reports WHERE created_at >= $1")
            .bind(since)
            .fetch_all(pool)
            .await
    }

    pub async fn resolved_since(
        pool: &SqlitePool,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT resolved_at FROM reports WHERE resolved_at IS NOT NULL AND resolved_at >= $1",
        )
        .bind(since)
        .fetch_all(pool)
        .await
    }

    /// Coordinates and priority of every geolocated report, optionally filtered by status.
    pub async fn geo_points(
        pool: &SqlitePool,
        status: Option<ReportStatus>,
    ) -> Result<Vec<(f64, f64, ReportPriority)>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT latitude, longitude, priority FROM reports WHERE latitude IS NOT NULL AND longitude IS NOT NULL",
        );
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status);
        }
        qb.build_query_as::<(f64, f64, ReportPriority)>()
            .fetch_all(pool)
            .await
    }

    /// Report counts per `(team, status)` for assigned reports.
    pub async fn count_by_team_and_status(
        pool: &SqlitePool,
    ) -> Result<Vec<(Uuid, ReportStatus, i64)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT assigned_to, status, COUNT(*) FROM reports WHERE assigned_to IS NOT NULL GROUP BY assigned_to, status",
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn terminal_states_have_no_successors() {
        assert!(ReportStatus::Closed.is_terminal());
        assert!(ReportStatus::Rejected.is_terminal());
        assert!(!ReportStatus::Resolved.is_terminal());
    }

    #[test]
    fn only_assigned_and_in_progress_hold_slots() {
        let holders: Vec<_> = ReportStatus::iter().filter(|s| s.holds_team_slot()).collect();
        assert_eq!(
            holders,
            vec![ReportStatus::Assigned, ReportStatus::InProgress]
        );
    }

    #[test]
    fn reopening_is_only_possible_from_resolved() {
        assert!(ReportStatus::Resolved.can_transition_to(ReportStatus::InProgress));
        assert!(!ReportStatus::Closed.can_transition_to(ReportStatus::InProgress));
        assert!(!ReportStatus::Submitted.can_transition_to(ReportStatus::Resolved));
    }

    #[test]
    fn priority_raise_saturates() {
        assert_eq!(ReportPriority::Low.raised(), ReportPriority::Medium);
        assert_eq!(ReportPriority::Critical.raised(), ReportPriority::Critical);
        assert_eq!(ReportPriority::Critical.weight(), 4);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("pothole"), "pothole");
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&ReportStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(ReportStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            "in_progress".parse::<ReportStatus>().unwrap(),
            ReportStatus::InProgress
        );
    }
}
