//! Bearer-token extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use db::models::admin::Permission;
use services::services::auth::Session;

use crate::{AppState, error::ApiError};

/// Any valid session, guest included.
#[derive(Debug, Clone)]
pub struct AuthSession(pub Session);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized("missing bearer token".to_string()))?;
        let session = state.auth.verify(bearer.token())?;
        Ok(Self(session))
    }
}

/// A signed-in admin; guest sessions are refused with 403.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

impl AdminSession {
    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if self.0.has_permission(permission) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("missing permission {permission}")))
        }
    }

    pub fn actor(&self) -> &str {
        self.0.actor()
    }
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthSession(session) = AuthSession::from_request_parts(parts, state).await?;
        if session.is_guest() {
            return Err(ApiError::Forbidden(
                "guest sessions cannot use admin endpoints".to_string(),
            ));
        }
        Ok(Self(session))
    }
}
