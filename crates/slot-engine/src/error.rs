//! Error types for slot-engine operations.
//!
//! These are the fatal conditions: any of them aborts a batch before a single
//! event is written. Per-task outcomes live in [`crate::scheduler::TaskFailure`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No tasks provided")]
    NoTasksProvided,

    #[error("No available slot found in the next {horizon_days} days")]
    AvailabilityExhausted { horizon_days: u32 },

    /// The busy-interval source could not be reached or refused the query.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid time of day: {0} (expected HH:MM)")]
    InvalidTimeOfDay(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
