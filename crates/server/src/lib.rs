use axum::Router;

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Full HTTP surface: `/api/*` plus the static `/uploads` tree.
pub fn build_router(state: AppState) -> Router {
    routes::router(state)
}
