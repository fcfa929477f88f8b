mod dto;
pub mod freshness;
pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod reconcile;
pub mod repo;
pub mod repo_types;
pub mod services;
mod validators;

use crate::state::AppState;
use axum::Router;

pub use repo::{PgProductRepository, ProductRepository};
pub use services::ProductService;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
