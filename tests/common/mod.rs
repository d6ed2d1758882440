#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use coin_stats_monitor::{
    error::AppError,
    models::{CreatePriceObservation, PriceObservation, Quote},
    services::{QuoteMap, QuoteSource},
};

pub fn tracked() -> Vec<String> {
    vec!["bitcoin".to_string(), "matic-network".to_string(), "ethereum".to_string()]
}

pub fn quote(price: f64) -> Quote {
    Quote {
        price_usd: price,
        market_cap_usd: price * 19_000_000.0,
        change_24h_pct: 1.25,
    }
}

pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

pub fn observation(asset_id: &str, price: f64, observed_at: DateTime<Utc>) -> PriceObservation {
    PriceObservation::new(CreatePriceObservation {
        asset_id: asset_id.to_string(),
        price_usd: price,
        market_cap_usd: price * 19_000_000.0,
        change_24h_pct: -0.75,
        observed_at,
    })
    .unwrap()
}

/// Quote source returning a fixed map, optionally after a delay.
pub struct StaticQuoteSource {
    quotes: Mutex<Result<QuoteMap, AppError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requested: Mutex<Vec<Vec<String>>>,
}

impl StaticQuoteSource {
    pub fn new(quotes: QuoteMap) -> Self {
        Self {
            quotes: Mutex::new(Ok(quotes)),
            delay: None,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: AppError) -> Self {
        Self {
            quotes: Mutex::new(Err(error)),
            delay: None,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_quotes(&self, quotes: QuoteMap) {
        *self.quotes.lock().unwrap() = Ok(quotes);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<Vec<String>> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteSource for StaticQuoteSource {
    async fn fetch_quotes(&self, asset_ids: &[String]) -> Result<QuoteMap, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(asset_ids.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.quotes.lock().unwrap().clone()
    }
}

pub fn quotes_for(prices: &[(&str, f64)]) -> QuoteMap {
    prices
        .iter()
        .map(|(asset_id, price)| (asset_id.to_string(), quote(*price)))
        .collect()
}
