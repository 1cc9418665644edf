use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage query timed out")]
    Timeout,

    #[error("Data integrity anomaly: {0}")]
    DataIntegrity(String),
}

impl StatsError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StatsError::StorageUnavailable(_) | StatsError::Timeout)
    }
}

impl From<sqlx::Error> for StatsError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => StatsError::Timeout,
            other => StatsError::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for StatsError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        StatsError::Timeout
    }
}
