//! Structured error types for engine operations.

use crate::triggers::TriggerError;
use serde::Serialize;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidFieldValue,

    // Not found errors
    TaskNotFound,
    ReminderNotFound,
    ListNotFound,

    // Backend errors
    StoreFailure,
    SchedulerFailure,
    InternalError,
}

/// Error returned by the lifecycle engine and reconciler.
///
/// A missing row is not an error for trash transitions; those report
/// [`crate::types::Outcome::NotFound`] instead.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The store rejected or failed the operation. Entity state is unchanged.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),

    /// The trigger scheduler failed outright (not a downgrade).
    #[error("trigger scheduler error: {0}")]
    Trigger(#[from] TriggerError),

    /// An input value was rejected before reaching the store.
    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// An entity the operation depends on does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: i64 },

    /// A blocking store call panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl CoreError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        CoreError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    pub fn task_not_found(id: i64) -> Self {
        CoreError::NotFound { kind: "task", id }
    }

    pub fn reminder_not_found(id: i64) -> Self {
        CoreError::NotFound { kind: "reminder", id }
    }

    pub fn list_not_found(id: i64) -> Self {
        CoreError::NotFound { kind: "list", id }
    }

    /// Stable code for callers that branch on the failure category.
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::Store(_) => ErrorCode::StoreFailure,
            CoreError::Trigger(_) => ErrorCode::SchedulerFailure,
            CoreError::InvalidValue { .. } => ErrorCode::InvalidFieldValue,
            CoreError::NotFound { kind: "task", .. } => ErrorCode::TaskNotFound,
            CoreError::NotFound { kind: "reminder", .. } => ErrorCode::ReminderNotFound,
            CoreError::NotFound { .. } => ErrorCode::ListNotFound,
            CoreError::Join(_) => ErrorCode::InternalError,
        }
    }
}

/// Result type for engine operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
