//! File-backed calendar collaborators for offline use.
//!
//! Busy time is read from a JSON array of `{ "start": RFC3339, "end": RFC3339 }`
//! objects; created events are collected in memory and written out as JSON.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slot_engine::{BusyInterval, BusyIntervalSource, EventSink, NewEvent, SinkError};
use tracing::debug;

/// Busy intervals loaded from a JSON file.
#[derive(Debug, Default)]
pub struct FileBusySource {
    busy: Vec<BusyInterval>,
}

impl FileBusySource {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read busy file: {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("Invalid busy file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let busy: Vec<BusyInterval> = serde_json::from_str(json)?;
        Ok(Self { busy })
    }

    pub fn intervals(&self) -> &[BusyInterval] {
        &self.busy
    }
}

#[async_trait]
impl BusyIntervalSource for FileBusySource {
    async fn get_busy(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, SinkError> {
        let busy: Vec<BusyInterval> = self
            .busy
            .iter()
            .filter(|b| b.start < time_max && b.end > time_min)
            .copied()
            .collect();
        debug!(calendar_id, matched = busy.len(), total = self.busy.len(), "busy query");
        Ok(busy)
    }
}

/// Collects created events so they can be written out after the batch.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<NewEvent>>,
}

impl CollectingSink {
    /// Events in creation order.
    pub fn into_events(self) -> Vec<NewEvent> {
        self.events
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn create_event(&self, calendar_id: &str, event: &NewEvent) -> Result<(), SinkError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| SinkError::Rejected("event store poisoned".to_string()))?;
        debug!(calendar_id, title = %event.title, start = %event.start, "event created");
        events.push(event.clone());
        Ok(())
    }
}
