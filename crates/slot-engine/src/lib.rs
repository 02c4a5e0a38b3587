//! # slot-engine
//!
//! Places a pasted list of short tasks onto a calendar as fixed-length events,
//! inside a daily working window and around existing busy time.
//!
//! The engine owns the algorithmic part only. Reading busy time and writing
//! events go through two narrow async traits ([`BusyIntervalSource`] and
//! [`EventSink`]) that callers implement for their calendar backend.
//!
//! ## Modules
//!
//! - [`resolver`] — Lazy search for free slots across days, up to a horizon
//! - [`scheduler`] — Pair tasks with slots, create events, collect a per-task report
//! - [`interval`] — Half-open intervals and busy-set normalization
//! - [`ports`] — Collaborator traits for the calendar backend
//! - [`retry`] — Exponential-backoff retry decorator for an [`EventSink`]
//! - [`settings`] — JSON user settings with defaults and validation
//! - [`time_of_day`] — `HH:MM` wall-clock times
//! - [`tasks`] — Turning pasted text into a task list
//! - [`clock`] — The "now" injection point
//! - [`error`] — Error types

pub mod clock;
pub mod error;
pub mod interval;
pub mod ports;
pub mod resolver;
pub mod retry;
pub mod scheduler;
pub mod settings;
pub mod tasks;
pub mod time_of_day;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::EngineError;
pub use interval::{BusyInterval, Interval, Slot};
pub use ports::{BusyIntervalSource, EventSink, NewEvent, SinkError};
pub use resolver::{resolve, SearchConfig, Slots, WorkingHours};
pub use retry::{RetryPolicy, RetryingSink};
pub use scheduler::{
    BatchReport, BatchScheduler, PlacementPlan, Progress, ScheduleOptions, ScheduleResult,
    TaskFailure,
};
pub use settings::Settings;
pub use tasks::parse_task_list;
pub use time_of_day::TimeOfDay;
