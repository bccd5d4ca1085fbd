use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::report::ReportStatus;

/// Kind of entry in a report's activity log
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "update_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UpdateAction {
    Created,
    StatusChanged,
    Assigned,
    Unassigned,
    PriorityChanged,
    Note,
    Escalated,
}

/// Actor recorded for entries written by the intake path
pub const ACTOR_CITIZEN: &str = "citizen";
/// Actor recorded for entries written by background services
pub const ACTOR_SYSTEM: &str = "system";

/// Append-only log entry attached to a report
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ReportUpdate {
    pub id: Uuid,
    pub report_id: Uuid,
    pub action: UpdateAction,
    pub from_status: Option<ReportStatus>,
    pub to_status: Option<ReportStatus>,
    pub team_id: Option<Uuid>,
    pub note: Option<String>,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateReportUpdate {
    pub report_id: Uuid,
    pub action: UpdateAction,
    pub from_status: Option<ReportStatus>,
    pub to_status: Option<ReportStatus>,
    pub team_id: Option<Uuid>,
    pub note: Option<String>,
    pub actor: String,
}

impl CreateReportUpdate {
    pub fn new(report_id: Uuid, action: UpdateAction, actor: impl Into<String>) -> Self {
        Self {
            report_id,
            action,
            from_status: None,
            to_status: None,
            team_id: None,
            note: None,
            actor: actor.into(),
        }
    }

    pub fn transition(mut self, from: ReportStatus, to: ReportStatus) -> Self {
        self.from_status = Some(from);
        self.to_status = Some(to);
        self
    }

    pub fn team(mut self, team_id: Option<Uuid>) -> Self {
        self.team_id = team_id;
        self
    }

    pub fn note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }
}

impl ReportUpdate {
    pub async fn create<'e, E>(
        executor: E,
        data: CreateReportUpdate,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, ReportUpdate>(
            r#"INSERT INTO report_updates (id, report_id, action, from_status, to_status, team_id, note, actor, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id, report_id, action, from_status, to_status, team_id, note, actor, created_at"#,
        )
        .bind(id)
        .bind(data.report_id)
        .bind(data.action)
        .bind(data.from_status)
        .bind(data.to_status)
        .bind(data.team_id)
        .bind(data.note)
        .bind(data.actor)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Oldest first.
    pub async fn find_by_report_id<'e, E>(
        executor: E,
        report_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ReportUpdate>(
            r#"SELECT id, report_id, action, from_status, to_status, team_id, note, actor, created_at
               FROM report_updates
               WHERE report_id = $1
               ORDER BY created_at ASC, rowid ASC"#,
        )
        .bind(report_id)
        .fetch_all(executor)
        .await
    }
}
