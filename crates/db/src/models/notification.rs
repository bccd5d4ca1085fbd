use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "notification_event", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationEvent {
    ReportSubmitted,
    StatusChanged,
    ReportAssigned,
    ReportUnassigned,
    ReportEscalated,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "notification_channel", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationChannel {
    InApp,
    Email,
    Whatsapp,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "delivery_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Skipped,
    Failed,
}

/// One delivery attempt, successful or not
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct NotificationLog {
    pub id: Uuid,
    pub report_id: Option<Uuid>,
    pub event: NotificationEvent,
    pub channel: NotificationChannel,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateNotificationLog {
    pub report_id: Option<Uuid>,
    pub event: NotificationEvent,
    pub channel: NotificationChannel,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
}

impl NotificationLog {
    pub async fn create(
        pool: &SqlitePool,
        data: CreateNotificationLog,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, NotificationLog>(
            r#"INSERT INTO notifications (id, report_id, event, channel, recipient, subject, body, status, error, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING id, report_id, event, channel, recipient, subject, body, status, error, created_at"#,
        )
        .bind(id)
        .bind(data.report_id)
        .bind(data.event)
        .bind(data.channel)
        .bind(data.recipient)
        .bind(data.subject)
        .bind(data.body)
        .bind(data.status)
        .bind(data.error)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Newest first.
    pub async fn find_recent(
        pool: &SqlitePool,
        report_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, NotificationLog>(
            r#"SELECT id, report_id, event, channel, recipient, subject, body, status, error, created_at
               FROM notifications
               WHERE ($1 IS NULL OR report_id = $1)
               ORDER BY created_at DESC, rowid DESC
               LIMIT $2"#,
        )
        .bind(report_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
