// src/error/types.rs
use crate::domain::DomainError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("Invalid arguments for filter '{filter}': {reason}")]
    InvalidFilterArguments { filter: String, reason: String },

    #[error("Query executor failure: {0}")]
    Executor(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parse error: {0}")]
    DateParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

impl AppError {
    /// Shorthand for rejecting a filter call before anything is merged.
    pub fn invalid_args(filter: &str, reason: impl Into<String>) -> Self {
        AppError::InvalidFilterArguments {
            filter: filter.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures raised by the storage side rather than by the caller.
    pub fn is_executor_failure(&self) -> bool {
        matches!(
            self,
            AppError::Executor(_) | AppError::Database(_) | AppError::Pool(_)
        )
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<chrono::ParseError> for AppError {
    fn from(err: chrono::ParseError) -> Self {
        AppError::DateParse(err.to_string())
    }
}

impl From<r2d2::Error> for AppError {
    fn from(err: r2d2::Error) -> Self {
        AppError::Pool(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
