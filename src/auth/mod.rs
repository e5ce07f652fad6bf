use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod reset;
pub mod services;
pub mod store;

pub fn router() -> Router<AppState> {
    Router::new().nest("/auth", handlers::auth_routes())
}
