use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::post,
};
use axum_extra::extract::WithRejection;
use services::services::media::StoredMedia;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub async fn upload_media(
    State(state): State<AppState>,
    WithRejection(mut multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<StoredMedia>>), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        let stored = state
            .media
            .save(file_name.as_deref(), content_type.as_deref(), &bytes)
            .await?;
        return Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(stored))));
    }
    Err(ApiError::BadRequest(
        "multipart field `file` is required".to_string(),
    ))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let limit = state.media.max_bytes() + MULTIPART_OVERHEAD;
    Router::new().route(
        "/uploads",
        post(upload_media).layer(DefaultBodyLimit::max(limit)),
    )
}
