//! Queue error types.

use avenc_models::{JobId, ModelError};
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The identifier is already queued. Callers treat this as an
    /// idempotent-retry signal rather than a hard failure.
    #[error("Duplicate job: {0}")]
    DuplicateJob(JobId),

    #[error("Invalid job: {0}")]
    InvalidJob(#[from] ModelError),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    /// Check if the error is the duplicate-enqueue signal.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, QueueError::DuplicateJob(_))
    }
}
