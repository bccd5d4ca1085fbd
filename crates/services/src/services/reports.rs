//! Report intake and read paths: submission, public tracking, listings.

use chrono::{DateTime, NaiveDate, Utc};
use db::{
    DBService,
    models::{
        report::{
            CreateReport, GeoLocation, NewReport, Report, ReportCategory, ReportFilter,
            ReportPriority, ReportStatus,
        },
        report_update::{ACTOR_CITIZEN, CreateReportUpdate, ReportUpdate, UpdateAction},
        team::Team,
    },
};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqliteConnection};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use utils::tracking_id;
use uuid::Uuid;

use super::{
    ai_analysis::analyze_description,
    notification::{Notification, NotificationService},
};

pub const MAX_DESCRIPTION_LEN: usize = 5000;
const MAX_SHORT_FIELD_LEN: usize = 200;
const MAX_ADDRESS_LEN: usize = 500;
const MAX_TRACKING_ID_ATTEMPTS: usize = 3;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("report not found")]
    NotFound,
    #[error("team not found")]
    TeamNotFound,
    #[error("{0}")]
    Validation(String),
    #[error("cannot move report from {from} to {to}")]
    InvalidTransition { from: ReportStatus, to: ReportStatus },
    #[error("team {0} is at capacity")]
    TeamAtCapacity(String),
    #[error("team {0} is inactive")]
    TeamInactive(String),
    #[error("report was modified concurrently, reload and retry")]
    Conflict,
    #[error("no tracking ids left for {0}")]
    TrackingIdsExhausted(NaiveDate),
}

impl From<sqlx::Error> for ReportError {
    fn from(error: sqlx::Error) -> Self {
        // lock contention that outlasted the busy timeout; the caller may retry
        if db::is_busy(&error) {
            ReportError::Conflict
        } else {
            ReportError::Database(error)
        }
    }
}

impl ReportError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ReportError::Validation(message.into())
    }
}

/// Looks a report up by UUID or tracking id.
pub async fn resolve_report<'e, E>(executor: E, reference: &str) -> Result<Report, ReportError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let reference = reference.trim();
    let found = match Uuid::parse_str(reference) {
        Ok(id) => Report::find_by_id(executor, id).await?,
        Err(_) => Report::find_by_tracking_id(executor, &reference.to_uppercase()).await?,
    };
    found.ok_or(ReportError::NotFound)
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// 1-based page and clamped page size; the offset saturates for absurd pages.
pub fn page_window(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let page = page.unwrap_or(1).max(1);
    (page, limit, (page - 1).saturating_mul(limit))
}

/// Full record for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ReportDetails {
    #[serde(flatten)]
    pub report: Report,
    pub team: Option<Team>,
    pub updates: Vec<ReportUpdate>,
}

/// Report as shown in the public feed; reporter identity is withheld.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PublicReportSummary {
    pub tracking_id: String,
    pub description: String,
    pub status: ReportStatus,
    pub priority: ReportPriority,
    pub category: ReportCategory,
    pub location: GeoLocation,
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<Report> for PublicReportSummary {
    fn from(report: Report) -> Self {
        Self {
            tracking_id: report.tracking_id,
            description: report.description,
            status: report.status,
            priority: report.priority,
            category: report.category,
            location: report.location,
            media_url: report.media_url,
            created_at: report.created_at,
            resolved_at: report.resolved_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PublicUpdate {
    pub action: UpdateAction,
    pub from_status: Option<ReportStatus>,
    pub to_status: Option<ReportStatus>,
    pub created_at: DateTime<Utc>,
}

/// What a citizen sees when looking up their tracking id.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TrackingView {
    #[serde(flatten)]
    pub report: PublicReportSummary,
    pub updated_at: DateTime<Utc>,
    pub updates: Vec<PublicUpdate>,
}

#[derive(Clone)]
pub struct ReportService {
    db: DBService,
    notifications: NotificationService,
}

impl ReportService {
    pub fn new(db: DBService, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    pub async fn create(&self, payload: CreateReport) -> Result<Report, ReportError> {
        let payload = validate_submission(payload)?;
        let analysis = analyze_description(&payload.description);
        let now = Utc::now();

        let mut new_report = NewReport {
            tracking_id: String::new(),
            category: payload.category.unwrap_or(analysis.suggested_category),
            priority: payload.priority.unwrap_or(analysis.suggested_priority),
            description: payload.description,
            location: payload.location.unwrap_or_default(),
            media_url: payload.media_url,
            reporter_name: payload.reporter_name,
            reporter_contact: payload.reporter_contact,
            ai_category: Some(analysis.suggested_category),
            ai_confidence: Some(analysis.confidence),
        };

        for attempt in 1..=MAX_TRACKING_ID_ATTEMPTS {
            let mut tx = self.db.begin_write().await?;
            new_report.tracking_id = next_tracking_id(&mut tx, now.date_naive()).await?;

            let report = match Report::create(&mut *tx, Uuid::new_v4(), &new_report, now).await {
                Ok(report) => report,
                Err(e) if is_unique_violation(&e) && attempt < MAX_TRACKING_ID_ATTEMPTS => {
                    warn!(
                        tracking_id = %new_report.tracking_id,
                        attempt,
                        "Tracking id collision, retrying"
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            ReportUpdate::create(
                &mut *tx,
                CreateReportUpdate {
                    to_status: Some(report.status),
                    ..CreateReportUpdate::new(report.id, UpdateAction::Created, ACTOR_CITIZEN)
                },
                now,
            )
            .await?;
            tx.commit().await?;

            info!(
                report_id = %report.id,
                tracking_id = %report.tracking_id,
                category = %report.category,
                priority = %report.priority,
                "Report submitted"
            );
            self.notifications
                .dispatch(Notification::report_submitted(&report));
            return Ok(report);
        }

        Err(ReportError::TrackingIdsExhausted(now.date_naive()))
    }

    pub async fn track(&self, reference: &str) -> Result<TrackingView, ReportError> {
        let report = resolve_report(&self.db.pool, reference).await?;
        let updates = ReportUpdate::find_by_report_id(&self.db.pool, report.id)
            .await?
            .into_iter()
            .filter(|u| u.action != UpdateAction::Note)
            .map(|u| PublicUpdate {
                action: u.action,
                from_status: u.from_status,
                to_status: u.to_status,
                created_at: u.created_at,
            })
            .collect();
        let updated_at = report.updated_at;
        Ok(TrackingView {
            report: report.into(),
            updated_at,
            updates,
        })
    }

    pub async fn details(&self, reference: &str) -> Result<ReportDetails, ReportError> {
        let report = resolve_report(&self.db.pool, reference).await?;
        let team = match report.assigned_to {
            Some(team_id) => Team::find_by_id(&self.db.pool, team_id).await?,
            None => None,
        };
        let updates = ReportUpdate::find_by_report_id(&self.db.pool, report.id).await?;
        Ok(ReportDetails {
            report,
            team,
            updates,
        })
    }

    pub async fn list(
        &self,
        filter: &ReportFilter,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Page<Report>, ReportError> {
        let (page, limit, offset) = page_window(page, limit);
        let items = Report::list(&self.db.pool, filter, limit, offset).await?;
        let total = Report::count(&self.db.pool, filter).await?;
        Ok(Page {
            items,
            total,
            page,
            limit,
        })
    }

    pub async fn public_feed(
        &self,
        filter: &ReportFilter,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Page<PublicReportSummary>, ReportError> {
        let page = self.list(filter, page, limit).await?;
        Ok(Page {
            items: page.items.into_iter().map(Into::into).collect(),
            total: page.total,
            page: page.page,
            limit: page.limit,
        })
    }
}

async fn next_tracking_id(
    conn: &mut SqliteConnection,
    date: NaiveDate,
) -> Result<String, ReportError> {
    let latest = Report::latest_tracking_id_like(&mut *conn, &tracking_id::day_pattern(date)).await?;
    let next = latest
        .as_deref()
        .and_then(tracking_id::parse)
        .map(|(_, sequence)| sequence + 1)
        .unwrap_or(1);
    if next > tracking_id::MAX_DAILY_SEQUENCE {
        return Err(ReportError::TrackingIdsExhausted(date));
    }
    Ok(tracking_id::format(date, next))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_len(field: &str, value: &Option<String>, max: usize) -> Result<(), ReportError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ReportError::validation(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

/// Normalizes blank optional fields to `None` and rejects out-of-range input.
pub fn validate_submission(payload: CreateReport) -> Result<CreateReport, ReportError> {
    let description = payload.description.trim().to_string();
    if description.is_empty() {
        return Err(ReportError::validation("description is required"));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ReportError::validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }

    let location = match payload.location {
        Some(location) => {
            let location = GeoLocation {
                address: trimmed(location.address),
                ..location
            };
            match (location.latitude, location.longitude) {
                (Some(lat), Some(lng)) => {
                    if !(-90.0..=90.0).contains(&lat) {
                        return Err(ReportError::validation("latitude must be within [-90, 90]"));
                    }
                    if !(-180.0..=180.0).contains(&lng) {
                        return Err(ReportError::validation(
                            "longitude must be within [-180, 180]",
                        ));
                    }
                }
                (None, None) => {}
                _ => {
                    return Err(ReportError::validation(
                        "latitude and longitude must be provided together",
                    ));
                }
            }
            check_len("address", &location.address, MAX_ADDRESS_LEN)?;
            Some(location)
        }
        None => None,
    };

    let media_url = trimmed(payload.media_url);
    if let Some(url) = &media_url {
        let allowed = url.starts_with("/uploads/")
            || url.starts_with("https://")
            || url.starts_with("http://");
        if !allowed {
            return Err(ReportError::validation(
                "media_url must be an uploaded file or an http(s) URL",
            ));
        }
    }
    check_len("media_url", &media_url, MAX_ADDRESS_LEN)?;

    let reporter_name = trimmed(payload.reporter_name);
    let reporter_contact = trimmed(payload.reporter_contact);
    check_len("reporter_name", &reporter_name, MAX_SHORT_FIELD_LEN)?;
    check_len("reporter_contact", &reporter_contact, MAX_SHORT_FIELD_LEN)?;

    Ok(CreateReport {
        description,
        category: payload.category,
        priority: payload.priority,
        location,
        media_url,
        reporter_name,
        reporter_contact,
    })
}
