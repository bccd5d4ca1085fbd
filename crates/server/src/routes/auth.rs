//! Login endpoints and the current-session lookup.

use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::admin::AdminProfile;
use serde::{Deserialize, Serialize};
use services::services::auth::{GuestLoginRequest, LoginRequest, LoginResponse, Session};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, auth::AuthSession, error::ApiError, extract::Json};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CurrentSession {
    pub session: Session,
    pub admin: Option<AdminProfile>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<LoginResponse>>, ApiError> {
    let response = state.auth.login(payload).await?;
    Ok(ResponseJson(ApiResponse::success(response)))
}

pub async fn guest_login(
    State(state): State<AppState>,
    Json(payload): Json<GuestLoginRequest>,
) -> Result<ResponseJson<ApiResponse<LoginResponse>>, ApiError> {
    let response = state.auth.guest_login(payload)?;
    Ok(ResponseJson(ApiResponse::success(response)))
}

pub async fn me(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<ResponseJson<ApiResponse<CurrentSession>>, ApiError> {
    let admin = match session.admin_id {
        Some(id) => state.auth.profile(id).await?,
        None => None,
    };
    Ok(ResponseJson(ApiResponse::success(CurrentSession {
        session,
        admin,
    })))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/auth",
        Router::new()
            .route("/login", post(login))
            .route("/guest", post(guest_login))
            .route("/me", get(me)),
    )
}
