use sqlx::PgPool;
use crate::error::AppError;
use tracing::{info, error};

pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            error!("Migration failed: {}", e);
            AppError::from(e)
        })?;

    info!("Database migrations completed successfully");
    Ok(())
}
