use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::{PriceObservation, WriteMode};
use crate::services::price_storage::{ensure_positive_limit, not_found, HistoryStore};

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    /// Per asset, in insertion order, tagged with a global insertion sequence.
    assets: HashMap<String, Vec<(u64, PriceObservation)>>,
}

/// In-process history store. Each write happens under one lock acquisition,
/// so readers never observe a partially applied write.
#[derive(Clone, Default)]
pub struct InMemoryHistoryStore {
    inner: Arc<RwLock<Inner>>,
    enforce_unique_timestamps: bool,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unique_timestamps(mut self, enforce: bool) -> Self {
        self.enforce_unique_timestamps = enforce;
        self
    }

    /// Number of stored observations for `asset_id`.
    pub async fn count(&self, asset_id: &str) -> usize {
        self.inner
            .read()
            .await
            .assets
            .get(asset_id)
            .map_or(0, Vec::len)
    }

    async fn newest_first(&self, asset_id: &str) -> Vec<PriceObservation> {
        let inner = self.inner.read().await;
        let mut records = match inner.assets.get(asset_id) {
            Some(records) => records.clone(),
            None => return Vec::new(),
        };
        records.sort_by(|(seq_a, a), (seq_b, b)| {
            b.observed_at.cmp(&a.observed_at).then(seq_b.cmp(seq_a))
        });
        records.into_iter().map(|(_, observation)| observation).collect()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn write(&self, observation: &PriceObservation, mode: WriteMode) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        let enforce_unique = self.enforce_unique_timestamps;
        let records = inner.assets.entry(observation.asset_id.clone()).or_default();

        match mode {
            WriteMode::Append => {
                if enforce_unique
                    && records.iter().any(|(_, existing)| existing.observed_at == observation.observed_at)
                {
                    return Err(AppError::DuplicateTimestamp(format!(
                        "{} already has an observation at {}",
                        observation.asset_id, observation.observed_at
                    )));
                }
                records.push((seq, observation.clone()));
            }
            WriteMode::Upsert => {
                records.clear();
                records.push((seq, observation.clone()));
            }
        }

        inner.next_seq += 1;
        Ok(())
    }

    async fn read_latest(&self, asset_id: &str) -> Result<PriceObservation, AppError> {
        self.newest_first(asset_id)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| not_found(asset_id))
    }

    async fn read_recent(&self, asset_id: &str, limit: usize) -> Result<Vec<PriceObservation>, AppError> {
        ensure_positive_limit(limit)?;

        let mut records = self.newest_first(asset_id).await;
        if records.is_empty() {
            return Err(not_found(asset_id));
        }
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use crate::models::CreatePriceObservation;

    fn observation(asset_id: &str, price: f64, offset_secs: i64) -> PriceObservation {
        PriceObservation::new(CreatePriceObservation {
            asset_id: asset_id.to_string(),
            price_usd: price,
            market_cap_usd: price * 1_000.0,
            change_24h_pct: 0.5,
            observed_at: Utc::now() + Duration::seconds(offset_secs),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_empty_history_is_not_found() {
        let store = InMemoryHistoryStore::new();
        assert!(matches!(store.read_latest("bitcoin").await, Err(AppError::AssetNotFound(_))));
        assert!(matches!(store.read_recent("bitcoin", 10).await, Err(AppError::AssetNotFound(_))));
    }

    #[tokio::test]
    async fn test_zero_limit_is_rejected() {
        let store = InMemoryHistoryStore::new();
        store.write(&observation("bitcoin", 1.0, 0), WriteMode::Append).await.unwrap();
        assert!(matches!(store.read_recent("bitcoin", 0).await, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_failed_duplicate_write_leaves_sequence_untouched() {
        let store = InMemoryHistoryStore::new().with_unique_timestamps(true);
        let first = observation("bitcoin", 1.0, 0);
        store.write(&first, WriteMode::Append).await.unwrap();

        let mut duplicate = observation("bitcoin", 2.0, 0);
        duplicate.observed_at = first.observed_at;
        assert!(matches!(
            store.write(&duplicate, WriteMode::Append).await,
            Err(AppError::DuplicateTimestamp(_))
        ));
        assert_eq!(store.count("bitcoin").await, 1);
        assert_eq!(store.inner.read().await.next_seq, 1);
    }
}
