use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use tracing::error;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("Price source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Price source data missing: {0}")]
    SourceDataMissing(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Duplicate timestamp: {0}")]
    DuplicateTimestamp(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("{0}")]
    MissingParameter(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingParameter(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AssetNotFound(_) | AppError::InsufficientData(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Failures a retry may cure.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::SourceUnavailable(_) | AppError::StoreUnavailable(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = if status.is_server_error() {
            error!("Request failed: {}", self);
            "Internal server error.".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::StoreUnavailable(format!("Migration failed: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::SourceUnavailable(format!("request timed out: {}", err))
        } else {
            AppError::SourceUnavailable(format!("HTTP request error: {}", err))
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(format!("JSON serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::MissingParameter("coin".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::AssetNotFound("dogecoin".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InsufficientData("none".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::StoreUnavailable("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_transient_errors() {
        assert!(AppError::SourceUnavailable("timeout".into()).is_transient());
        assert!(!AppError::SourceDataMissing("ethereum".into()).is_transient());
    }
}
