use crate::state::AppState;
use axum::Router;

pub mod dto;
mod export;
pub mod handlers;
pub mod repo;
pub mod service;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
