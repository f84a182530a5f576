use std::time::Duration;

use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors surfaced by the queue engine and its store adapters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Job id was not a positive integer
    #[error("Invalid job id: {0}")]
    InvalidId(String),

    /// Lane is not part of the configured lane set
    #[error("Unsupported priority: {0}")]
    UnsupportedPriority(String),

    /// The underlying store failed (network, timeout, wrong type)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A Messages entry that does not decode as `ttr;payload`
    #[error("Malformed message {id}: {reason}")]
    MalformedMessage { id: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Blocking moving-lease acquisition gave up after the configured limit
    #[error("Timed out after {0:?} waiting for the moving lease")]
    LeaseTimeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Create a store error from any displayable failure
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(err.to_string())
    }

    /// Create a malformed-message error
    pub fn malformed(id: impl ToString, reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether a harness may reasonably retry the call that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::LeaseTimeout(_))
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("Serialization error: {}", err))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        Self::store(err)
    }
}
