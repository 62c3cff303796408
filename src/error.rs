//! Unified error handling for the dripfeed crate
//!
//! Each boundary keeps its own domain error (store, channel, roster,
//! scheduler); this module consolidates them into a single [`Error`] enum
//! for callers that cross module boundaries, with a coarse
//! [`ErrorCategory`] and a recoverability classification.

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::channel::ChannelError;
pub use crate::roster::RosterError;
pub use crate::scheduler::SchedulerError;
pub use crate::store::StoreError;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, rate limit)
    Network,
    /// Durable-state and I/O errors
    Storage,
    /// Messaging channel errors
    Channel,
    /// Configuration and validation errors
    Config,
    /// Scheduler and timing errors
    Scheduler,
    /// Other/unknown errors
    Other,
}

/// Unified error type for the dripfeed crate
#[derive(Error, Debug)]
pub enum Error {
    /// Content store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Messaging channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Subscriber roster errors
    #[error("Roster error: {0}")]
    Roster(#[from] RosterError),

    /// Scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Check if this error is recoverable (worth retrying on a later cycle)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Channel(e) => e.is_transient(),
            Self::Roster(e) => matches!(e, RosterError::Io(_)),
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Store(StoreError::Io(_)) => ErrorCategory::Storage,
            Self::Store(_) => ErrorCategory::Network,
            Self::Channel(ChannelError::InvalidConfig(_)) => ErrorCategory::Config,
            Self::Channel(_) => ErrorCategory::Channel,
            Self::Roster(_) | Self::Io(_) | Self::Json(_) => ErrorCategory::Storage,
            Self::Scheduler(SchedulerError::TriggerConfig { .. }) => ErrorCategory::Config,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
