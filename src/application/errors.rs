//! Orchestrator error taxonomy

use uuid::Uuid;

use crate::domain::repositories::StoreError;

/// Errors surfaced to callers of the orchestrator's public operations.
///
/// Scanner failures never appear here: they become terminal `Failed` job
/// states discovered through polling. Cache failures never appear either;
/// they degrade to cache misses.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Malformed target URL or out-of-range pagination. Rejected before any
    /// state change.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scan job not found: {0}")]
    NotFound(Uuid),

    /// A store-level in-flight uniqueness constraint rejected a create.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Persistence error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Store(other),
        }
    }
}
