//! Collaborator traits for the calendar backend.
//!
//! The engine never talks to a calendar API directly. Callers pass an
//! implementation of each trait per call, so tests substitute in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interval::BusyInterval;

/// Failure of a single collaborator call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The backend received the request and refused it.
    #[error("{0}")]
    Rejected(String),

    /// Network or authentication failure; the request may not have arrived.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SinkError {
    pub fn is_transport(&self) -> bool {
        matches!(self, SinkError::Transport(_))
    }
}

/// One event to be written to a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// IANA zone name, passed through untouched.
    pub time_zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Source of already-occupied time ranges.
#[async_trait]
pub trait BusyIntervalSource: Send + Sync {
    /// All busy periods overlapping `[time_min, time_max)`.
    ///
    /// Ordering and overlap within the result are not guaranteed.
    async fn get_busy(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, SinkError>;
}

/// Writes events to a calendar. Each call creates exactly one event; calls
/// are not idempotent.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn create_event(&self, calendar_id: &str, event: &NewEvent) -> Result<(), SinkError>;
}

#[async_trait]
impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    async fn create_event(&self, calendar_id: &str, event: &NewEvent) -> Result<(), SinkError> {
        (**self).create_event(calendar_id, event).await
    }
}

#[async_trait]
impl<T: BusyIntervalSource + ?Sized> BusyIntervalSource for std::sync::Arc<T> {
    async fn get_busy(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, SinkError> {
        (**self).get_busy(calendar_id, time_min, time_max).await
    }
}
