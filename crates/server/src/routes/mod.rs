use axum::Router;
use services::services::media::PUBLIC_PREFIX;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::AppState;

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod health;
pub mod reports;
pub mod teams;
pub mod uploads;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(health::router(&state))
        .merge(auth::router(&state))
        .merge(reports::router(&state))
        .merge(admin::router(&state))
        .merge(teams::router(&state))
        .merge(analytics::router(&state))
        .merge(uploads::router(&state));

    Router::new()
        .nest("/api", api)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(&state.config.upload_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
