use sqlx::{PgPool, postgres::PgPoolOptions};
use crate::error::AppError;
use tracing::{info, error};
use std::time::Duration;
use tokio::time::timeout;

pub async fn establish_connection(database_url: &str, max_connections: u32) -> Result<PgPool, AppError> {
    info!("Establishing database connection");

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            AppError::StoreUnavailable(format!("Connection failed: {}", e))
        })?;

    info!("Database connection established successfully with {} max connections", max_connections);
    Ok(pool)
}

pub async fn test_connection(pool: &PgPool) -> Result<(), AppError> {
    timeout(Duration::from_secs(5), sqlx::query("SELECT 1").execute(pool))
        .await
        .map_err(|_| AppError::StoreUnavailable("Connection test timed out".to_string()))?
        .map_err(|e| AppError::StoreUnavailable(format!("Connection test failed: {}", e)))?;

    Ok(())
}
