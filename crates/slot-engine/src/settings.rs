//! User settings: working window, slot shape, calendar and sink policy.
//!
//! Stored as a JSON document. Every field is optional; missing fields take
//! the defaults below.

use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::resolver::{
    SearchConfig, WorkingHours, DEFAULT_DURATION_MINUTES, DEFAULT_GRANULARITY_MINUTES,
    DEFAULT_HORIZON_DAYS,
};
use crate::retry::RetryPolicy;
use crate::scheduler::PlacementPlan;
use crate::time_of_day::TimeOfDay;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub duration_minutes: u32,
    pub granularity_minutes: u32,
    pub horizon_days: u32,
    /// IANA zone the working window is expressed in.
    pub timezone: String,
    pub calendar_id: String,
    pub max_in_flight: usize,
    pub event_description: Option<String>,
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            start_time: TimeOfDay::new(9, 0).unwrap_or(TimeOfDay::MIDNIGHT),
            end_time: TimeOfDay::new(17, 0).unwrap_or(TimeOfDay::MIDNIGHT),
            duration_minutes: DEFAULT_DURATION_MINUTES,
            granularity_minutes: DEFAULT_GRANULARITY_MINUTES,
            horizon_days: DEFAULT_HORIZON_DAYS,
            timezone: "UTC".to_string(),
            calendar_id: "primary".to_string(),
            max_in_flight: 1,
            event_description: None,
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Attempts per event; 1 disables retries.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            ..RetryPolicy::default()
        }
    }
}

impl Settings {
    /// Parse and validate a settings document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// # Errors
    /// `EngineError::InvalidConfig` for counts that are zero or out of range, and
    /// `EngineError::InvalidTimezone` for an unknown zone name. An inverted
    /// daily window is accepted; it simply never yields a slot.
    pub fn validate(&self) -> Result<()> {
        self.search().validate()?;
        if self.max_in_flight == 0 {
            return Err(EngineError::InvalidConfig(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(EngineError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        self.tz()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| EngineError::InvalidTimezone(self.timezone.clone()))
    }

    pub fn search(&self) -> SearchConfig {
        SearchConfig {
            duration_minutes: self.duration_minutes,
            granularity_minutes: self.granularity_minutes,
            horizon_days: self.horizon_days,
        }
    }

    pub fn working_hours(&self) -> Result<WorkingHours> {
        Ok(WorkingHours::new(self.start_time, self.end_time).in_timezone(self.tz()?))
    }

    /// A plan that starts searching at `window_start`.
    pub fn plan(&self, window_start: DateTime<Utc>) -> Result<PlacementPlan> {
        Ok(PlacementPlan {
            calendar_id: self.calendar_id.clone(),
            window_start,
            hours: self.working_hours()?,
            search: self.search(),
        })
    }
}
