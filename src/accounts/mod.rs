use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod error;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod session;

pub fn router(upload_max_bytes: usize) -> Router<AppState> {
    handlers::account_routes(upload_max_bytes)
}
