//! Batch scheduler: pair tasks with free slots and write one event per pair.
//!
//! A batch moves through `ResolvingSlots -> CreatingEvents -> Completed`.
//! Fatal conditions (no tasks, no slot within the horizon, busy source
//! unreachable) are returned as [`EngineError`] before any event is written.
//! Once event creation starts, every task ends up with exactly one
//! [`ScheduleResult`] in the report, in input order, no matter how many sink
//! calls fail.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{EngineError, Result};
use crate::interval::{BusyInterval, Slot};
use crate::ports::{BusyIntervalSource, EventSink, NewEvent};
use crate::resolver::{self, SearchConfig, WorkingHours};

/// Where and how to place a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementPlan {
    pub calendar_id: String,
    /// Earliest instant to place anything at; raised to "now" if in the past.
    pub window_start: DateTime<Utc>,
    pub hours: WorkingHours,
    pub search: SearchConfig,
}

/// Why a single task did not get an event.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskFailure {
    #[error("no free slot left within the horizon")]
    InsufficientSlots,

    #[error("event creation failed: {reason}")]
    EventCreationFailed { reason: String },

    #[error("batch cancelled before this task was attempted")]
    Cancelled,
}

/// Outcome for one input task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResult {
    pub task: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,
}

impl ScheduleResult {
    fn scheduled(task: &str, at: DateTime<Utc>) -> Self {
        Self {
            task: task.to_string(),
            success: true,
            scheduled_at: Some(at),
            error: None,
        }
    }

    fn failed(task: &str, failure: TaskFailure) -> Self {
        Self {
            task: task.to_string(),
            success: false,
            scheduled_at: None,
            error: Some(failure),
        }
    }
}

/// Per-task results of a batch, in original task order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<ScheduleResult>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Failed task titles with their reasons, in input order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &TaskFailure)> {
        self.results
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| (r.task.as_str(), e)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }
}

/// Progress notification sent after every sink attempt.
///
/// `total` counts tasks that received a slot, i.e. the number of sink calls
/// the batch will make if it is not cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub remaining_estimate_seconds: u64,
}

/// Per-call extras: a progress observer and a cancellation token.
#[derive(Clone, Default)]
pub struct ScheduleOptions<'a> {
    observer: Option<&'a (dyn Fn(Progress) + Send + Sync)>,
    cancel: CancellationToken,
}

impl<'a> ScheduleOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(mut self, observer: &'a (dyn Fn(Progress) + Send + Sync)) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Tasks not yet attempted when `cancel` fires are reported as cancelled.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Places batches of tasks. Holds policy only; collaborators are per call.
#[derive(Clone)]
pub struct BatchScheduler {
    clock: Arc<dyn Clock>,
    max_in_flight: usize,
    description: Option<String>,
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            max_in_flight: 1,
            description: None,
        }
    }
}

impl BatchScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Maximum concurrent sink calls; values below 1 are treated as 1.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Description attached to every created event.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Fetch busy intervals from `source`, then run [`Self::schedule_all`].
    ///
    /// # Errors
    /// Returns `EngineError::NoTasksProvided` for an empty task list (the
    /// source is not queried), `EngineError::InvalidConfig` for a search
    /// config out of range (also before any query), `EngineError::Transport`
    /// if the busy query fails, and anything [`Self::schedule_all`] returns.
    #[instrument(skip_all, fields(tasks = tasks.len(), calendar = %plan.calendar_id))]
    pub async fn fetch_and_schedule(
        &self,
        tasks: &[String],
        plan: &PlacementPlan,
        source: &dyn BusyIntervalSource,
        sink: &dyn EventSink,
        options: &ScheduleOptions<'_>,
    ) -> Result<BatchReport> {
        if tasks.is_empty() {
            return Err(EngineError::NoTasksProvided);
        }

        plan.search.validate()?;

        let now = self.clock.now();
        let time_min = plan.window_start.max(now);
        // One extra day covers a start that rolls over to tomorrow.
        let time_max = time_min
            .checked_add_signed(Duration::days(i64::from(plan.search.horizon_days) + 1))
            .ok_or_else(|| {
                EngineError::InvalidConfig(
                    "horizon extends past the supported date range".to_string(),
                )
            })?;

        let busy = source
            .get_busy(&plan.calendar_id, time_min, time_max)
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        debug!(busy = busy.len(), %time_min, %time_max, "fetched busy intervals");

        self.schedule_at(now, tasks, plan, &busy, sink, options).await
    }

    /// Place `tasks` into free slots around `busy` and create one event per task.
    ///
    /// The Nth free slot goes to the Nth task. Tasks left without a slot are
    /// reported as [`TaskFailure::InsufficientSlots`]; a failing sink call only
    /// affects its own task.
    ///
    /// # Errors
    /// Returns `EngineError::NoTasksProvided` for an empty task list and
    /// `EngineError::AvailabilityExhausted` when no slot exists at all. In
    /// both cases the sink is never called.
    #[instrument(skip_all, fields(tasks = tasks.len(), calendar = %plan.calendar_id))]
    pub async fn schedule_all(
        &self,
        tasks: &[String],
        plan: &PlacementPlan,
        busy: &[BusyInterval],
        sink: &dyn EventSink,
        options: &ScheduleOptions<'_>,
    ) -> Result<BatchReport> {
        let now = self.clock.now();
        self.schedule_at(now, tasks, plan, busy, sink, options).await
    }

    async fn schedule_at(
        &self,
        now: DateTime<Utc>,
        tasks: &[String],
        plan: &PlacementPlan,
        busy: &[BusyInterval],
        sink: &dyn EventSink,
        options: &ScheduleOptions<'_>,
    ) -> Result<BatchReport> {
        if tasks.is_empty() {
            return Err(EngineError::NoTasksProvided);
        }

        let slots: Vec<Slot> =
            resolver::resolve(plan.window_start, now, &plan.hours, &plan.search, busy)?
                .take(tasks.len())
                .collect();

        if slots.len() < tasks.len() {
            warn!(
                requested = tasks.len(),
                found = slots.len(),
                "not enough free slots, scheduling a partial batch"
            );
        }

        let mut results: Vec<Option<ScheduleResult>> = vec![None; tasks.len()];
        for (task, entry) in tasks.iter().zip(results.iter_mut()).skip(slots.len()) {
            *entry = Some(ScheduleResult::failed(task, TaskFailure::InsufficientSlots));
        }

        let total = slots.len();
        let time_zone = plan.hours.timezone.name().to_string();
        let calendar_id = plan.calendar_id.as_str();
        let cancel = &options.cancel;

        let mut attempts = stream::iter(slots.into_iter().enumerate())
            .map(|(idx, slot)| {
                let event = NewEvent {
                    title: tasks[idx].clone(),
                    start: slot.start,
                    end: slot.end,
                    time_zone: time_zone.clone(),
                    description: self.description.clone(),
                };
                async move {
                    if cancel.is_cancelled() {
                        return (idx, slot, None);
                    }
                    let outcome = sink.create_event(calendar_id, &event).await;
                    (idx, slot, Some(outcome))
                }
            })
            .buffer_unordered(self.max_in_flight);

        let started = Instant::now();
        let mut completed = 0usize;

        while let Some((idx, slot, outcome)) = attempts.next().await {
            let task = &tasks[idx];
            let attempted = outcome.is_some();
            let result = match outcome {
                None => ScheduleResult::failed(task, TaskFailure::Cancelled),
                Some(Ok(())) => ScheduleResult::scheduled(task, slot.start),
                Some(Err(err)) => {
                    warn!(task = %task, error = %err, "event creation failed");
                    ScheduleResult::failed(
                        task,
                        TaskFailure::EventCreationFailed {
                            reason: err.to_string(),
                        },
                    )
                }
            };
            results[idx] = Some(result);

            if attempted {
                completed += 1;
                if let Some(observer) = options.observer {
                    observer(Progress {
                        completed,
                        total,
                        remaining_estimate_seconds: estimate_remaining(
                            started.elapsed(),
                            completed,
                            total,
                        ),
                    });
                }
            }
        }

        let report = BatchReport {
            results: results
                .into_iter()
                .zip(tasks)
                .map(|(r, task)| {
                    r.unwrap_or_else(|| ScheduleResult::failed(task, TaskFailure::Cancelled))
                })
                .collect(),
        };

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            total = report.total(),
            "batch completed"
        );
        Ok(report)
    }
}

/// Average time per attempt so far, times the attempts still to go.
fn estimate_remaining(elapsed: std::time::Duration, completed: usize, total: usize) -> u64 {
    if completed == 0 {
        return 0;
    }
    let per_attempt = elapsed.as_secs_f64() / completed as f64;
    (per_attempt * total.saturating_sub(completed) as f64).ceil() as u64
}
