use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{services::CollectorStatus, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreHealth {
    pub healthy: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub store: StoreHealth,
    pub collector: Option<CollectorStatus>,
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store = match state.store.health_check().await {
        Ok(()) => StoreHealth { healthy: true, error: None },
        Err(e) => {
            warn!("Health check: store unavailable: {}", e);
            StoreHealth { healthy: false, error: Some(e.to_string()) }
        }
    };

    let collector = match &state.collector {
        Some(collector) => Some(collector.status().await),
        None => None,
    };

    let status = if store.healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let response = HealthResponse {
        status: if store.healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store,
        collector,
    };

    (status, Json(response))
}
