use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::services::price_storage::HistoryStore;
use crate::services::stats_engine::compute_deviation;

pub const DEFAULT_DEVIATION_WINDOW: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinStatsResponse {
    pub price: f64,
    #[serde(rename = "marketCap")]
    pub market_cap: f64,
    #[serde(rename = "24hChange")]
    pub change_24h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationResponse {
    pub deviation: f64,
}

/// Read-only queries over the observation history.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn HistoryStore>,
    deviation_window: usize,
}

impl QueryService {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self::with_window(store, DEFAULT_DEVIATION_WINDOW)
    }

    pub fn with_window(store: Arc<dyn HistoryStore>, deviation_window: usize) -> Self {
        Self {
            store,
            deviation_window: deviation_window.max(1),
        }
    }

    pub fn deviation_window(&self) -> usize {
        self.deviation_window
    }

    /// Latest price, market cap and 24h change for `coin`.
    pub async fn get_stats(&self, coin: Option<&str>) -> Result<CoinStatsResponse, AppError> {
        let asset_id = require_coin(coin)?;
        let latest = self.store.read_latest(asset_id).await?;
        debug!("Serving stats for {} observed at {}", asset_id, latest.observed_at);

        Ok(CoinStatsResponse {
            price: latest.price_usd,
            market_cap: latest.market_cap_usd,
            change_24h: latest.change_24h_pct,
        })
    }

    /// Population standard deviation of the most recent prices for `coin`.
    pub async fn get_deviation(&self, coin: Option<&str>) -> Result<DeviationResponse, AppError> {
        let asset_id = require_coin(coin)?;
        let records = self.store.read_recent(asset_id, self.deviation_window).await?;
        let prices: Vec<f64> = records.iter().map(|record| record.price_usd).collect();
        let stats = compute_deviation(&prices)?;
        debug!(
            "Deviation for {} over {} samples: mean={} std_dev={}",
            asset_id, stats.sample_count, stats.mean, stats.std_dev
        );

        Ok(DeviationResponse {
            deviation: stats.rounded_std_dev(),
        })
    }
}

fn require_coin(coin: Option<&str>) -> Result<&str, AppError> {
    coin.map(str::trim)
        .filter(|coin| !coin.is_empty())
        .ok_or_else(|| AppError::MissingParameter("Query parameter \"coin\" is required.".to_string()))
}
