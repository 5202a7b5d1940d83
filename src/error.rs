use thiserror::Error;

/// Failures raised by the storage collaborator. They reach callers unchanged.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected row: {0}")]
    InvalidRow(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("invalid aggregation input for `{parameter}`: {reason}")]
    InvalidAggregationInput { parameter: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("aggregation cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("worker failed: {0}")]
    Worker(String),
}

impl EngineError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn invalid_input(parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAggregationInput {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    /// Only storage failures may succeed on a later attempt; retrying is the
    /// caller's decision, the engine never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Database(_) | StoreError::Unavailable(_)))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_names_parameter() {
        let err = EngineError::invalid_input("temperature", "contains NaN");
        assert_eq!(
            err.to_string(),
            "invalid aggregation input for `temperature`: contains NaN"
        );
    }

    #[test]
    fn only_store_failures_are_retryable() {
        assert!(EngineError::Store(StoreError::Unavailable("down".into())).is_retryable());
        assert!(!EngineError::validation("bad week").is_retryable());
        assert!(!EngineError::NotFound("2023-W08".into()).is_retryable());
        assert!(!EngineError::Cancelled.is_retryable());
    }
}
