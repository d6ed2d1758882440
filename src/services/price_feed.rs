use std::collections::HashMap;
use std::time::Duration;
use async_trait::async_trait;
use serde::Deserialize;
use reqwest::Client;
use url::Url;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::PriceSourceSettings;
use crate::error::types::AppError;
use crate::models::Quote;
use crate::utils::fault_tolerance::{retry_with_backoff, RetryConfig};

/// Quotes keyed by asset id.
pub type QuoteMap = HashMap<String, Quote>;

/// Source of current market quotes for a set of assets.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch quotes for every asset in one call.
    ///
    /// Assets the upstream omits (or reports incompletely) are absent from the
    /// returned map. Fails with `SourceDataMissing` only when none of the
    /// requested assets came back usable.
    async fn fetch_quotes(&self, asset_ids: &[String]) -> Result<QuoteMap, AppError>;
}

/// CoinGecko `/simple/price` response entry.
#[derive(Debug, Deserialize)]
struct CoinGeckoSimplePrice {
    usd: Option<f64>,
    usd_market_cap: Option<f64>,
    usd_24h_change: Option<f64>,
}

/// CoinGecko client issuing a single batched request per fetch.
pub struct CoinGeckoClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    request_timeout: Duration,
    retry: RetryConfig,
}

impl CoinGeckoClient {
    pub fn new(settings: &PriceSourceSettings) -> Result<Self, AppError> {
        let request_timeout = Duration::from_secs(settings.timeout_seconds);
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent("Coin-Stats-Monitor/1.0")
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(settings.base_url.trim_end_matches('/'))
            .map_err(|e| AppError::ConfigError(format!("Invalid price source URL '{}': {}", settings.base_url, e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
            request_timeout,
            retry: RetryConfig {
                max_retries: settings.max_retries,
                initial_delay: Duration::from_millis(settings.retry_delay_ms),
                ..RetryConfig::default()
            },
        })
    }

    /// `{base}/simple/price?ids=a,b,c&vs_currencies=usd&include_market_cap=true&include_24hr_change=true`
    pub fn quote_url(&self, asset_ids: &[String]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["simple", "price"]);
        }
        url.query_pairs_mut()
            .append_pair("ids", &asset_ids.join(","))
            .append_pair("vs_currencies", "usd")
            .append_pair("include_market_cap", "true")
            .append_pair("include_24hr_change", "true");
        url
    }

    async fn request_quotes(&self, url: &Url) -> Result<HashMap<String, CoinGeckoSimplePrice>, AppError> {
        // Bounds the whole exchange, body included.
        timeout(self.request_timeout, self.send_request(url))
            .await
            .map_err(|_| {
                AppError::SourceUnavailable(format!(
                    "CoinGecko request timed out after {:?}",
                    self.request_timeout
                ))
            })?
    }

    async fn send_request(&self, url: &Url) -> Result<HashMap<String, CoinGeckoSimplePrice>, AppError> {
        let mut request = self.client.get(url.clone());
        if let Some(api_key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SourceUnavailable(format!("CoinGecko API error: {}", status)));
        }

        response
            .json::<HashMap<String, CoinGeckoSimplePrice>>()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("CoinGecko JSON parse error: {}", e)))
    }
}

#[async_trait]
impl QuoteSource for CoinGeckoClient {
    async fn fetch_quotes(&self, asset_ids: &[String]) -> Result<QuoteMap, AppError> {
        if asset_ids.is_empty() {
            return Ok(QuoteMap::new());
        }

        let url = self.quote_url(asset_ids);
        debug!("CoinGecko API URL: {}", url);

        let raw = retry_with_backoff("coingecko_simple_price", &self.retry, || self.request_quotes(&url)).await?;
        let quotes = extract_quotes(asset_ids, raw);

        if quotes.is_empty() {
            return Err(AppError::SourceDataMissing(format!(
                "no usable quotes for {}",
                asset_ids.join(",")
            )));
        }

        info!("Fetched {} of {} requested quotes", quotes.len(), asset_ids.len());
        Ok(quotes)
    }
}

fn extract_quotes(asset_ids: &[String], mut raw: HashMap<String, CoinGeckoSimplePrice>) -> QuoteMap {
    let mut quotes = QuoteMap::new();
    for asset_id in asset_ids {
        let quote = raw
            .remove(asset_id)
            .and_then(|entry| Quote::from_parts(entry.usd, entry.usd_market_cap, entry.usd_24h_change));
        match quote {
            Some(quote) => {
                quotes.insert(asset_id.clone(), quote);
            }
            None => warn!("No usable quote for {} in CoinGecko response", asset_id),
        }
    }
    quotes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> CoinGeckoClient {
        CoinGeckoClient::new(&PriceSourceSettings {
            base_url: base_url.to_string(),
            ..PriceSourceSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn test_quote_url_is_batched() {
        let url = client("https://api.coingecko.com/api/v3/").quote_url(&[
            "bitcoin".to_string(),
            "matic-network".to_string(),
            "ethereum".to_string(),
        ]);

        assert_eq!(url.path(), "/api/v3/simple/price");
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["ids"], "bitcoin,matic-network,ethereum");
        assert_eq!(pairs["vs_currencies"], "usd");
        assert_eq!(pairs["include_market_cap"], "true");
        assert_eq!(pairs["include_24hr_change"], "true");
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let result = CoinGeckoClient::new(&PriceSourceSettings {
            base_url: "not a url".to_string(),
            ..PriceSourceSettings::default()
        });
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_extract_quotes_skips_incomplete_entries() {
        let raw: HashMap<String, CoinGeckoSimplePrice> = serde_json::from_str(
            r#"{
                "bitcoin": {"usd": 65000.0, "usd_market_cap": 1.28e12, "usd_24h_change": 1.5},
                "ethereum": {"usd": 3400.0},
                "dogecoin": {"usd": 0.1, "usd_market_cap": 1.4e10, "usd_24h_change": 0.2}
            }"#,
        )
        .unwrap();
        let requested = vec!["bitcoin".to_string(), "ethereum".to_string(), "matic-network".to_string()];

        let quotes = extract_quotes(&requested, raw);

        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes["bitcoin"].price_usd, 65000.0);
        assert!(!quotes.contains_key("dogecoin"));
    }
}
