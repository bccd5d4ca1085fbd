//! Admin dashboard listings and admin account management.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    admin::{AdminProfile, Permission},
    notification::NotificationLog,
    report::Report,
};
use serde::Deserialize;
use services::services::{
    auth::CreateAdminRequest,
    reports::{Page, resolve_report},
};
use ts_rs::TS;
use utils::response::ApiResponse;

use super::reports::ReportListQuery;
use crate::{
    AppState,
    auth::AdminSession,
    error::ApiError,
    extract::{Json, Query},
};

const DEFAULT_NOTIFICATION_LIMIT: i64 = 50;
const MAX_NOTIFICATION_LIMIT: i64 = 200;

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct NotificationQuery {
    /// Report UUID or tracking id
    pub report: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_reports(
    State(state): State<AppState>,
    session: AdminSession,
    Query(query): Query<ReportListQuery>,
) -> Result<ResponseJson<ApiResponse<Page<Report>>>, ApiError> {
    session.require(Permission::ViewReports)?;
    let page = state
        .reports
        .list(&query.filter(), query.page, query.limit)
        .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    session: AdminSession,
    Query(query): Query<NotificationQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<NotificationLog>>>, ApiError> {
    session.require(Permission::ViewReports)?;
    let report_id = match query.report.as_deref() {
        Some(reference) => Some(resolve_report(&state.db.pool, reference).await?.id),
        None => None,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_NOTIFICATION_LIMIT)
        .clamp(1, MAX_NOTIFICATION_LIMIT);
    let logs = state.notifications.recent(report_id, limit).await?;
    Ok(ResponseJson(ApiResponse::success(logs)))
}

pub async fn list_admins(
    State(state): State<AppState>,
    session: AdminSession,
) -> Result<ResponseJson<ApiResponse<Vec<AdminProfile>>>, ApiError> {
    session.require(Permission::ManageAdmins)?;
    let admins = state.auth.list_admins().await?;
    Ok(ResponseJson(ApiResponse::success(admins)))
}

pub async fn create_admin(
    State(state): State<AppState>,
    session: AdminSession,
    Json(payload): Json<CreateAdminRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<AdminProfile>>), ApiError> {
    session.require(Permission::ManageAdmins)?;
    let admin = state.auth.create_admin(&session.0, payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(admin))))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/admin",
        Router::new()
            .route("/reports", get(list_reports))
            .route("/notifications", get(list_notifications))
            .route("/admins", get(list_admins).post(create_admin)),
    )
}
