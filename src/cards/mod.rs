mod dto;
pub mod generator;
pub mod handlers;
pub mod ledger;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::generate_routes())
        .merge(handlers::ledger_routes())
}
