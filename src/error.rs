//! Structured error types for ledger operations.

use serde::Serialize;
use thiserror::Error;

/// Error codes for programmatic error handling.
///
/// Every [`LedgerError`] collapses onto one of these, which is what callers
/// translate into a user-facing response.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    Conflict,
    Forbidden,
    InvalidInput,
    PersistenceFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::PersistenceFailure => "PERSISTENCE_FAILURE",
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Precondition on the current status was not met.
    #[error("{0}")]
    Conflict(String),

    /// The requesting player does not own the task, or the admin secret did not match.
    #[error("{0}")]
    Forbidden(String),

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(#[from] refinery::Error),

    #[error("storage unavailable: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::NotFound { .. } => ErrorCode::NotFound,
            LedgerError::Conflict(_) => ErrorCode::Conflict,
            LedgerError::Forbidden(_) => ErrorCode::Forbidden,
            LedgerError::InvalidInput { .. } => ErrorCode::InvalidInput,
            LedgerError::Database(_) | LedgerError::Migration(_) | LedgerError::Storage(_) => {
                ErrorCode::PersistenceFailure
            }
        }
    }

    // Convenience constructors

    pub fn task_not_found(task_id: i64) -> Self {
        LedgerError::NotFound {
            entity: "task",
            id: task_id,
        }
    }

    pub fn template_not_found(template_id: i64) -> Self {
        LedgerError::NotFound {
            entity: "template",
            id: template_id,
        }
    }

    pub fn player_not_found(player_id: i64) -> Self {
        LedgerError::NotFound {
            entity: "player",
            id: player_id,
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        LedgerError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_owner(task_id: i64, player_id: i64) -> Self {
        LedgerError::Forbidden(format!(
            "Player {} does not own task {}",
            player_id, task_id
        ))
    }

    pub fn wrong_status(task_id: i64, actual: &str, expected: &str) -> Self {
        LedgerError::Conflict(format!(
            "Task {} is {}, expected {}",
            task_id, actual, expected
        ))
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
