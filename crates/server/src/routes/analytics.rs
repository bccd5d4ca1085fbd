use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{admin::Permission, report::ReportStatus};
use serde::Deserialize;
use services::services::analytics::{
    AnalyticsSummary, HeatmapCell, TeamPerformance, TrendPoint,
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, auth::AdminSession, error::ApiError, extract::Query};

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct TrendsQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct HeatmapQuery {
    pub precision: Option<u32>,
    pub status: Option<ReportStatus>,
}

pub async fn summary(
    State(state): State<AppState>,
    session: AdminSession,
) -> Result<ResponseJson<ApiResponse<AnalyticsSummary>>, ApiError> {
    session.require(Permission::ViewAnalytics)?;
    Ok(ResponseJson(ApiResponse::success(
        state.analytics.summary().await?,
    )))
}

pub async fn trends(
    State(state): State<AppState>,
    session: AdminSession,
    Query(query): Query<TrendsQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<TrendPoint>>>, ApiError> {
    session.require(Permission::ViewAnalytics)?;
    Ok(ResponseJson(ApiResponse::success(
        state.analytics.trends(query.days).await?,
    )))
}

pub async fn heatmap(
    State(state): State<AppState>,
    session: AdminSession,
    Query(query): Query<HeatmapQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<HeatmapCell>>>, ApiError> {
    session.require(Permission::ViewAnalytics)?;
    Ok(ResponseJson(ApiResponse::success(
        state
            .analytics
            .heatmap(query.precision, query.status)
            .await?,
    )))
}

pub async fn team_performance(
    State(state): State<AppState>,
    session: AdminSession,
) -> Result<ResponseJson<ApiResponse<Vec<TeamPerformance>>>, ApiError> {
    session.require(Permission::ViewAnalytics)?;
    Ok(ResponseJson(ApiResponse::success(
        state.analytics.team_performance().await?,
    )))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/analytics",
        Router::new()
            .route("/summary", get(summary))
            .route("/trends", get(trends))
            .route("/heatmap", get(heatmap))
            .route("/teams", get(team_performance)),
    )
}
