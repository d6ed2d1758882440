use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use crate::{
    error::AppError,
    services::{CoinStatsResponse, DeviationResponse},
    AppState,
};

/// `coin` is optional here so a missing parameter reaches the service as `MissingParameter`.
#[derive(Debug, Deserialize)]
pub struct CoinQuery {
    pub coin: Option<String>,
}

/// GET /stats?coin=<asset_id>
pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<CoinQuery>,
) -> Result<Json<CoinStatsResponse>, AppError> {
    let stats = state.query_service.get_stats(query.coin.as_deref()).await?;
    Ok(Json(stats))
}

/// GET /deviation?coin=<asset_id>
pub async fn get_deviation(
    State(state): State<AppState>,
    Query(query): Query<CoinQuery>,
) -> Result<Json<DeviationResponse>, AppError> {
    let deviation = state.query_service.get_deviation(query.coin.as_deref()).await?;
    Ok(Json(deviation))
}

pub fn create_stats_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/deviation", get(get_deviation))
}
