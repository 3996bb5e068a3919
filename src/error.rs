// Engine Error Types
use crate::store::StoreError;

/// Errors surfaced by the attendance engine.
///
/// Validation variants are raised synchronously before any store I/O; store
/// errors on the record path propagate as-is. Worklog reconciliation failures
/// never appear here: they are reported as a diagnostic field on the patch
/// outcome instead (the attendance record is the source of truth, worklogs
/// are best-effort derived data).
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Invalid month: {0}")]
    InvalidMonth(String),
    #[error("userId is required")]
    MissingUserId,
    #[error("Invalid action: {0}")]
    InvalidAction(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AttendanceError {
    /// Whether the error was raised before any mutation was attempted.
    /// Dispatchers use this to pick a client-error vs. server-error shape.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AttendanceError::InvalidDate(_)
                | AttendanceError::InvalidMonth(_)
                | AttendanceError::MissingUserId
                | AttendanceError::InvalidAction(_)
        )
    }
}
