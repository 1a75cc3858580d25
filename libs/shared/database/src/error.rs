use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The row changed after it was read in this unit of work.
    #[error("Row changed concurrently: {0}")]
    StaleWrite(String),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Persistence call timed out after {0} ms")]
    Timeout(u64),

    #[error("Persistence layer unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DatabaseError {
    /// Lost races, timeouts and outages are worth retrying; everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatabaseError::StaleWrite(_) | DatabaseError::Timeout(_) | DatabaseError::Unavailable(_)
        )
    }
}

impl From<reqwest::Error> for DatabaseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DatabaseError::Timeout(0)
        } else if err.is_connect() {
            DatabaseError::Unavailable(err.to_string())
        } else if err.is_decode() {
            DatabaseError::Query(format!("undecodable response: {}", err))
        } else {
            DatabaseError::Query(err.to_string())
        }
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UniqueViolation(constraint) => {
                AppError::Conflict(format!("Conflicting record ({})", constraint))
            }
            DatabaseError::StaleWrite(_) => AppError::Conflict(
                "The record was changed by another request, please retry".to_string(),
            ),
            DatabaseError::NotFound(what) => AppError::NotFound(what),
            DatabaseError::Timeout(_) | DatabaseError::Unavailable(_) => {
                AppError::Unavailable("Storage is temporarily unavailable, please retry".to_string())
            }
            other => AppError::Database(other.to_string()),
        }
    }
}
