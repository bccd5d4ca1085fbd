use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    analytics::AnalyticsError, auth::AuthError, media::MediaError, reports::ReportError,
    teams::TeamError,
};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Team(#[from] TeamError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    MultipartRejection(#[from] MultipartRejection),
    #[error(transparent)]
    Json(#[from] JsonRejection),
    #[error(transparent)]
    Query(#[from] QueryRejection),
    #[error(transparent)]
    Path(#[from] PathRejection),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Report(e) => match e {
                ReportError::NotFound | ReportError::TeamNotFound => StatusCode::NOT_FOUND,
                ReportError::Validation(_) | ReportError::InvalidTransition { .. } => {
                    StatusCode::BAD_REQUEST
                }
                ReportError::TeamAtCapacity(_)
                | ReportError::TeamInactive(_)
                | ReportError::Conflict => StatusCode::CONFLICT,
                ReportError::TrackingIdsExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
                ReportError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Team(e) => match e {
                TeamError::NotFound => StatusCode::NOT_FOUND,
                TeamError::Validation(_) => StatusCode::BAD_REQUEST,
                TeamError::DuplicateName(_) | TeamError::HasOpenAssignments(_) => {
                    StatusCode::CONFLICT
                }
                TeamError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Auth(e) => match e {
                AuthError::InvalidCredentials
                | AuthError::TokenExpired
                | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::GuestDisabled | AuthError::Forbidden => StatusCode::FORBIDDEN,
                AuthError::Validation(_) => StatusCode::BAD_REQUEST,
                AuthError::DuplicateEmail(_) => StatusCode::CONFLICT,
                AuthError::Signing(_) | AuthError::Database(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Media(e) => match e {
                MediaError::Empty => StatusCode::BAD_REQUEST,
                MediaError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                MediaError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                MediaError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Multipart(e) => e.status(),
            ApiError::MultipartRejection(e) => e.status(),
            // well-formed JSON of the wrong shape is a plain bad request here
            ApiError::Json(e) if e.status() == StatusCode::UNPROCESSABLE_ENTITY => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Json(e) => e.status(),
            ApiError::Query(e) => e.status(),
            ApiError::Path(e) => e.status(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Analytics(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use db::models::report::ReportStatus;

    use super::*;

    #[test]
    fn domain_errors_map_to_http_statuses() {
        let cases = [
            (ApiError::from(ReportError::NotFound), StatusCode::NOT_FOUND),
            (
                ApiError::from(ReportError::TeamAtCapacity("Roads".into())),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(ReportError::InvalidTransition {
                    from: ReportStatus::Closed,
                    to: ReportStatus::Submitted,
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(AuthError::InvalidToken),
                StatusCode::UNAUTHORIZED,
            ),
            (ApiError::from(AuthError::GuestDisabled), StatusCode::FORBIDDEN),
            (
                ApiError::from(MediaError::TooLarge { limit: 1 }),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                ApiError::from(MediaError::UnsupportedType("text/plain".into())),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                ApiError::from(TeamError::HasOpenAssignments(2)),
                StatusCode::CONFLICT,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status, "{error}");
        }
    }

    #[test]
    fn server_errors_hide_details() {
        let response = ApiError::from(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
