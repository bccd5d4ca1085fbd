//! Citizen intake, public tracking and the admin report workflow.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, patch, post},
};
use axum_extra::extract::WithRejection;
use db::models::{
    admin::Permission,
    report::{CreateReport, Report, ReportCategory, ReportFilter, ReportPriority, ReportStatus},
    report_update::ReportUpdate,
};
use serde::{Deserialize, Serialize};
use services::services::{
    ai_analysis::{AiAnalysis, analyze_description},
    report_workflow::{
        AddNoteRequest, AssignReportRequest, UnassignReportRequest, UpdatePriorityRequest,
        UpdateStatusRequest,
    },
    reports::{MAX_DESCRIPTION_LEN, Page, PublicReportSummary, ReportDetails, TrackingView},
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AdminSession, AuthSession},
    error::ApiError,
    extract::{Json, Path, Query},
};

/// Query string shared by the public feed and the admin listing
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ReportListQuery {
    pub status: Option<ReportStatus>,
    pub priority: Option<ReportPriority>,
    pub category: Option<ReportCategory>,
    pub team_id: Option<Uuid>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ReportListQuery {
    pub fn filter(&self) -> ReportFilter {
        ReportFilter {
            status: self.status,
            priority: self.priority,
            category: self.category,
            team_id: self.team_id,
            q: self.q.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AnalyzeRequest {
    pub description: String,
}

pub async fn create_report(
    State(state): State<AppState>,
    Json(payload): Json<CreateReport>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Report>>), ApiError> {
    let report = state.reports.create(payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(report))))
}

/// Runs the triage model without storing anything
pub async fn analyze_report(
    Json(payload): Json<AnalyzeRequest>,
) -> Result<ResponseJson<ApiResponse<AiAnalysis>>, ApiError> {
    let description = payload.description.trim();
    if description.is_empty() {
        return Err(ApiError::BadRequest("description is required".to_string()));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::BadRequest(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(ResponseJson(ApiResponse::success(analyze_description(
        description,
    ))))
}

pub async fn track_report(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<ResponseJson<ApiResponse<TrackingView>>, ApiError> {
    let view = state.reports.track(&reference).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

pub async fn public_feed(
    State(state): State<AppState>,
    AuthSession(_session): AuthSession,
    Query(query): Query<ReportListQuery>,
) -> Result<ResponseJson<ApiResponse<Page<PublicReportSummary>>>, ApiError> {
    let page = state
        .reports
        .public_feed(&query.filter(), query.page, query.limit)
        .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn get_report(
    State(state): State<AppState>,
    session: AdminSession,
    Path(reference): Path<String>,
) -> Result<ResponseJson<ApiResponse<ReportDetails>>, ApiError> {
    session.require(Permission::ViewReports)?;
    let details = state.reports.details(&reference).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn update_status(
    State(state): State<AppState>,
    session: AdminSession,
    Path(reference): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<ResponseJson<ApiResponse<Report>>, ApiError> {
    session.require(Permission::ManageReports)?;
    let report = state
        .workflow
        .update_status(&reference, payload, session.actor())
        .await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub async fn update_priority(
    State(state): State<AppState>,
    session: AdminSession,
    Path(reference): Path<String>,
    Json(payload): Json<UpdatePriorityRequest>,
) -> Result<ResponseJson<ApiResponse<Report>>, ApiError> {
    session.require(Permission::ManageReports)?;
    let report = state
        .workflow
        .set_priority(&reference, payload, session.actor())
        .await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub async fn assign_report(
    State(state): State<AppState>,
    session: AdminSession,
    Path(reference): Path<String>,
    Json(payload): Json<AssignReportRequest>,
) -> Result<ResponseJson<ApiResponse<Report>>, ApiError> {
    session.require(Permission::AssignReports)?;
    let report = state
        .workflow
        .assign(&reference, payload, session.actor())
        .await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub async fn unassign_report(
    State(state): State<AppState>,
    session: AdminSession,
    Path(reference): Path<String>,
    WithRejection(payload, _): WithRejection<Option<axum::Json<UnassignReportRequest>>, ApiError>,
) -> Result<ResponseJson<ApiResponse<Report>>, ApiError> {
    session.require(Permission::AssignReports)?;
    // the body is optional; a bare POST unassigns without a note
    let payload = payload.map(|axum::Json(body)| body).unwrap_or_default();
    let report = state
        .workflow
        .unassign(&reference, payload, session.actor())
        .await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub async fn add_note(
    State(state): State<AppState>,
    session: AdminSession,
    Path(reference): Path<String>,
    Json(payload): Json<AddNoteRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<ReportUpdate>>), ApiError> {
    session.require(Permission::ManageReports)?;
    let entry = state
        .workflow
        .add_note(&reference, payload, session.actor())
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(entry))))
}

pub async fn delete_report(
    State(state): State<AppState>,
    session: AdminSession,
    Path(reference): Path<String>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    session.require(Permission::ManageReports)?;
    state.workflow.delete(&reference, session.actor()).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/reports",
        Router::new()
            .route("/", post(create_report).get(public_feed))
            .route("/analyze", post(analyze_report))
            .route("/{id}", get(get_report).delete(delete_report))
            .route("/{id}/track", get(track_report))
            .route("/{id}/status", patch(update_status))
            .route("/{id}/priority", patch(update_priority))
            .route("/{id}/assign", post(assign_report))
            .route("/{id}/unassign", post(unassign_report))
            .route("/{id}/notes", post(add_note)),
    )
}
