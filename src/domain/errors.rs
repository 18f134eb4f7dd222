//! Domain errors for the veer scoring engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur while settling votes and advancing
/// progression. The settlement path catches these and reports a structured
/// failure record; import and advance propagate them to the caller.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Authorization required: {0}")]
    Unauthorized(String),

    #[error("Poll not found: {0}")]
    PollNotFound(Uuid),

    #[error("Poll option not found: {0}")]
    OptionNotFound(Uuid),

    #[error("Player not found: {0}")]
    PlayerNotFound(Uuid),

    #[error("No level configuration for stage {stage} level {level}")]
    ConfigMissing { stage: u32, level: u32 },

    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Convenience alias used across ports, adapters and services.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
