use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// One price/market-cap/change record for an asset at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PriceObservation {
    pub id: Uuid,
    pub asset_id: String,
    pub price_usd: f64,
    pub market_cap_usd: f64,
    pub change_24h_pct: f64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePriceObservation {
    pub asset_id: String,
    pub price_usd: f64,
    pub market_cap_usd: f64,
    pub change_24h_pct: f64,
    pub observed_at: DateTime<Utc>,
}

/// Current market figures for one asset as reported upstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price_usd: f64,
    pub market_cap_usd: f64,
    pub change_24h_pct: f64,
}

impl Quote {
    /// Builds a quote only from complete, positive, finite upstream figures.
    pub fn from_parts(
        price_usd: Option<f64>,
        market_cap_usd: Option<f64>,
        change_24h_pct: Option<f64>,
    ) -> Option<Self> {
        let quote = Quote {
            price_usd: price_usd?,
            market_cap_usd: market_cap_usd?,
            change_24h_pct: change_24h_pct?,
        };
        quote.is_usable().then_some(quote)
    }

    pub fn is_usable(&self) -> bool {
        self.price_usd.is_finite()
            && self.price_usd > 0.0
            && self.market_cap_usd.is_finite()
            && self.market_cap_usd > 0.0
            && self.change_24h_pct.is_finite()
    }
}

/// How the history store treats a new observation for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Keep every observation.
    Append,
    /// Keep only the latest observation per asset.
    Upsert,
}

impl FromStr for WriteMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(WriteMode::Append),
            "upsert" | "upsert_by_asset" => Ok(WriteMode::Upsert),
            other => Err(AppError::ConfigError(format!("unknown write mode: {}", other))),
        }
    }
}

impl PriceObservation {
    pub fn new(create: CreatePriceObservation) -> Result<Self, AppError> {
        let quote = Quote {
            price_usd: create.price_usd,
            market_cap_usd: create.market_cap_usd,
            change_24h_pct: create.change_24h_pct,
        };
        if create.asset_id.trim().is_empty() {
            return Err(AppError::ValidationError("asset_id must not be empty".to_string()));
        }
        if !quote.is_usable() {
            return Err(AppError::ValidationError(format!(
                "refusing degenerate observation for {}: price={} market_cap={} change={}",
                create.asset_id, create.price_usd, create.market_cap_usd, create.change_24h_pct
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            asset_id: create.asset_id,
            price_usd: create.price_usd,
            market_cap_usd: create.market_cap_usd,
            change_24h_pct: create.change_24h_pct,
            observed_at: create.observed_at,
        })
    }

    pub fn from_quote(asset_id: &str, quote: &Quote, observed_at: DateTime<Utc>) -> Result<Self, AppError> {
        Self::new(CreatePriceObservation {
            asset_id: asset_id.to_string(),
            price_usd: quote.price_usd,
            market_cap_usd: quote.market_cap_usd,
            change_24h_pct: quote.change_24h_pct,
            observed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_requires_every_field() {
        assert!(Quote::from_parts(Some(100.0), Some(1e9), Some(-2.5)).is_some());
        assert!(Quote::from_parts(Some(100.0), None, Some(1.0)).is_none());
        assert!(Quote::from_parts(None, Some(1e9), Some(1.0)).is_none());
        assert!(Quote::from_parts(Some(100.0), Some(1e9), None).is_none());
    }

    #[test]
    fn test_zero_and_nan_quotes_are_rejected() {
        assert!(Quote::from_parts(Some(0.0), Some(1e9), Some(1.0)).is_none());
        assert!(Quote::from_parts(Some(f64::NAN), Some(1e9), Some(1.0)).is_none());
        assert!(Quote::from_parts(Some(1.0), Some(-5.0), Some(1.0)).is_none());
    }

    #[test]
    fn test_observation_validation() {
        let now = Utc::now();
        let ok = PriceObservation::new(CreatePriceObservation {
            asset_id: "bitcoin".to_string(),
            price_usd: 65000.0,
            market_cap_usd: 1.2e12,
            change_24h_pct: 1.4,
            observed_at: now,
        })
        .unwrap();
        assert_eq!(ok.asset_id, "bitcoin");
        assert_eq!(ok.observed_at, now);

        let zero = PriceObservation::new(CreatePriceObservation {
            asset_id: "bitcoin".to_string(),
            price_usd: 0.0,
            market_cap_usd: 1.2e12,
            change_24h_pct: 1.4,
            observed_at: now,
        });
        assert!(matches!(zero, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_write_mode_parsing() {
        assert_eq!("append".parse::<WriteMode>().unwrap(), WriteMode::Append);
        assert_eq!("UPSERT".parse::<WriteMode>().unwrap(), WriteMode::Upsert);
        assert!("replace".parse::<WriteMode>().is_err());
    }
}
