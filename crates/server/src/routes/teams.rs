use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    admin::Permission,
    team::{CreateTeam, Team, UpdateTeam},
};
use services::services::teams::TeamWithLoad;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AdminSession,
    error::ApiError,
    extract::{Json, Path},
};

pub async fn list_teams(
    State(state): State<AppState>,
    _session: AdminSession,
) -> Result<ResponseJson<ApiResponse<Vec<TeamWithLoad>>>, ApiError> {
    let teams = state.teams.list().await?;
    Ok(ResponseJson(ApiResponse::success(teams)))
}

pub async fn get_team(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(team_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TeamWithLoad>>, ApiError> {
    let team = state.teams.get(team_id).await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

pub async fn create_team(
    State(state): State<AppState>,
    session: AdminSession,
    Json(payload): Json<CreateTeam>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Team>>), ApiError> {
    session.require(Permission::ManageTeams)?;
    let team = state.teams.create(payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(team))))
}

pub async fn update_team(
    State(state): State<AppState>,
    session: AdminSession,
    Path(team_id): Path<Uuid>,
    Json(payload): Json<UpdateTeam>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    session.require(Permission::ManageTeams)?;
    let team = state.teams.update(team_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

pub async fn delete_team(
    State(state): State<AppState>,
    session: AdminSession,
    Path(team_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    session.require(Permission::ManageTeams)?;
    state.teams.delete(team_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/teams",
        Router::new()
            .route("/", get(list_teams).post(create_team))
            .route(
                "/{id}",
                get(get_team).patch(update_team).delete(delete_team),
            ),
    )
}
