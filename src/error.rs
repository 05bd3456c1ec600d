//! Error types for the Sprout core.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SproutError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not authorized to {action} {resource}")]
    AuthorizationDenied { action: String, resource: String },
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Tray {label} is already at the final stage")]
    AlreadyTerminal { label: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Consistency anomaly during {operation}: expected {expected}, observed {observed}")]
    ConsistencyAnomaly {
        operation: String,
        expected: usize,
        observed: usize,
    },
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl SproutError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn denied(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::AuthorizationDenied {
            action: action.into(),
            resource: resource.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<sqlx::Error> for SproutError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => SproutError::NotFound("row not found".to_string()),
            other => SproutError::DatabaseError(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for SproutError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        SproutError::DatabaseError(format!("migration failed: {err}"))
    }
}

impl From<serde_json::Error> for SproutError {
    fn from(error: serde_json::Error) -> Self {
        SproutError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<crate::config::ConfigurationError> for SproutError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        SproutError::ConfigurationError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SproutError>;
