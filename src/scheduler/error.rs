//! Error types for the scheduler module

use thiserror::Error;

use crate::roster::RosterError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Trigger configuration rejected at configuration time; never reaches
    /// the delivery path
    #[error("Trigger config error in '{field}': {reason}")]
    TriggerConfig { field: String, reason: String },

    /// Roster access failed
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// The scheduler loop is already running
    #[error("Scheduler is already running")]
    AlreadyRunning,
}

impl SchedulerError {
    /// Create a trigger config error
    pub fn trigger_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TriggerConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Roster(_))
    }
}
