pub mod health;
pub mod stats_handlers;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub use health::health_check;
pub use stats_handlers::{create_stats_routes, get_deviation, get_stats, CoinQuery};

/// Full HTTP surface: `/stats`, `/deviation` and `/health`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(create_stats_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
