use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::database::connection::test_connection;
use crate::error::AppError;
use crate::models::{PriceObservation, WriteMode};

/// Time-ordered observation history per asset.
///
/// Every write is atomic: a concurrent reader sees the store either before or
/// after it, never a partial record. Reads order by `observed_at` descending,
/// ties broken by insertion order (latest insert first).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn write(&self, observation: &PriceObservation, mode: WriteMode) -> Result<(), AppError>;

    async fn read_latest(&self, asset_id: &str) -> Result<PriceObservation, AppError>;

    /// Up to `limit` most recent observations, newest first. A non-empty result
    /// shorter than `limit` is valid; an empty history is `AssetNotFound`.
    async fn read_recent(&self, asset_id: &str, limit: usize) -> Result<Vec<PriceObservation>, AppError>;

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn close(&self) {}
}

pub(crate) fn ensure_positive_limit(limit: usize) -> Result<(), AppError> {
    if limit == 0 {
        return Err(AppError::ValidationError("limit must be a positive integer".to_string()));
    }
    Ok(())
}

pub(crate) fn not_found(asset_id: &str) -> AppError {
    AppError::AssetNotFound(format!("no observations recorded for '{}'", asset_id))
}

/// Postgres-backed history in the `price_observations` table.
#[derive(Clone)]
pub struct PriceStorageService {
    db_pool: PgPool,
    enforce_unique_timestamps: bool,
}

impl PriceStorageService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool, enforce_unique_timestamps: false }
    }

    /// Reject appends that repeat an `(asset_id, observed_at)` pair.
    pub fn with_unique_timestamps(mut self, enforce: bool) -> Self {
        self.enforce_unique_timestamps = enforce;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.db_pool
    }
}

#[async_trait]
impl HistoryStore for PriceStorageService {
    async fn write(&self, observation: &PriceObservation, mode: WriteMode) -> Result<(), AppError> {
        let mut tx = self.db_pool.begin().await?;

        // Serializes writers per asset so concurrent upserts cannot leave two live rows.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&observation.asset_id)
            .execute(&mut *tx)
            .await?;

        match mode {
            WriteMode::Append => {
                if self.enforce_unique_timestamps {
                    let exists: bool = sqlx::query_scalar(
                        r#"
                        SELECT EXISTS(
                            SELECT 1 FROM price_observations
                            WHERE asset_id = $1 AND observed_at = $2
                        )
                        "#,
                    )
                    .bind(&observation.asset_id)
                    .bind(observation.observed_at)
                    .fetch_one(&mut *tx)
                    .await?;

                    if exists {
                        return Err(AppError::DuplicateTimestamp(format!(
                            "{} already has an observation at {}",
                            observation.asset_id, observation.observed_at
                        )));
                    }
                }
            }
            WriteMode::Upsert => {
                sqlx::query("DELETE FROM price_observations WHERE asset_id = $1")
                    .bind(&observation.asset_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        sqlx::query(
            r#"
            INSERT INTO price_observations (id, asset_id, price_usd, market_cap_usd, change_24h_pct, observed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(observation.id)
        .bind(&observation.asset_id)
        .bind(observation.price_usd)
        .bind(observation.market_cap_usd)
        .bind(observation.change_24h_pct)
        .bind(observation.observed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Stored {:?} observation for {}", mode, observation.asset_id);
        Ok(())
    }

    async fn read_latest(&self, asset_id: &str) -> Result<PriceObservation, AppError> {
        sqlx::query_as::<_, PriceObservation>(
            r#"
            SELECT id, asset_id, price_usd, market_cap_usd, change_24h_pct, observed_at
            FROM price_observations
            WHERE asset_id = $1
            ORDER BY observed_at DESC, seq DESC
            LIMIT 1
            "#,
        )
        .bind(asset_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| not_found(asset_id))
    }

    async fn read_recent(&self, asset_id: &str, limit: usize) -> Result<Vec<PriceObservation>, AppError> {
        ensure_positive_limit(limit)?;

        let records = sqlx::query_as::<_, PriceObservation>(
            r#"
            SELECT id, asset_id, price_usd, market_cap_usd, change_24h_pct, observed_at
            FROM price_observations
            WHERE asset_id = $1
            ORDER BY observed_at DESC, seq DESC
            LIMIT $2
            "#,
        )
        .bind(asset_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.db_pool)
        .await?;

        if records.is_empty() {
            return Err(not_found(asset_id));
        }
        Ok(records)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        test_connection(&self.db_pool).await
    }

    async fn close(&self) {
        info!("Closing database connection pool");
        self.db_pool.close().await;
    }
}
