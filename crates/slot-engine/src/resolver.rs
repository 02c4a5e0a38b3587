//! Availability resolver: a lazy, forward-only stream of free slots.
//!
//! The search walks `(local date, minute of day)` pairs inside a daily working
//! window, rolling over to the next day when the window is used up, and stops
//! at a fixed look-ahead horizon. Busy intervals are normalized once up front
//! (see [`BusySet`]), so the input may be unsorted and overlapping.
//!
//! Candidate placement rules:
//!
//! - The effective start is `max(window_start, now)`. At or after the day's
//!   `daily_end` the search jumps to the next day's `daily_start`; before
//!   `daily_start` it starts at `daily_start`; otherwise the local time of day
//!   is rounded up to the granularity grid (whole multiples of
//!   `granularity_minutes` since local midnight).
//! - After a slot is produced the next candidate starts where it ended, so
//!   slots pack back to back.
//! - After a conflict the next candidate starts at the first grid boundary at
//!   or after the end of the blocking busy interval.
//! - Every slot ends no later than the adjusted start plus `horizon_days`.
//! - Across a DST fall-back the repeated local hour is scanned on its second
//!   occurrence, so a slot never starts before the previous one ended.

use std::iter::FusedIterator;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::interval::{BusyInterval, BusySet, Interval, Slot};
use crate::time_of_day::{TimeOfDay, MINUTES_PER_DAY};

pub const DEFAULT_HORIZON_DAYS: u32 = 7;
pub const DEFAULT_GRANULARITY_MINUTES: u32 = 30;
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

/// A slot has to fit inside one day's window.
pub const MAX_DURATION_MINUTES: u32 = MINUTES_PER_DAY;
pub const MAX_GRANULARITY_MINUTES: u32 = MINUTES_PER_DAY;
pub const MAX_HORIZON_DAYS: u32 = 366;

/// The daily working window, as wall-clock time in `timezone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
    pub daily_start: TimeOfDay,
    pub daily_end: TimeOfDay,
    pub timezone: Tz,
}

impl WorkingHours {
    /// Working hours interpreted in UTC.
    pub fn new(daily_start: TimeOfDay, daily_end: TimeOfDay) -> Self {
        Self {
            daily_start,
            daily_end,
            timezone: Tz::UTC,
        }
    }

    pub fn in_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// `true` when `daily_end <= daily_start`; such a window never fits a slot.
    pub fn is_empty(&self) -> bool {
        self.daily_end <= self.daily_start
    }

    pub fn length_minutes(&self) -> u32 {
        self.daily_end.minutes().saturating_sub(self.daily_start.minutes())
    }
}

/// Slot length, rounding grid and look-ahead limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    pub duration_minutes: u32,
    pub granularity_minutes: u32,
    pub horizon_days: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            duration_minutes: DEFAULT_DURATION_MINUTES,
            granularity_minutes: DEFAULT_GRANULARITY_MINUTES,
            horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }
}

impl SearchConfig {
    pub fn with_duration(duration_minutes: u32) -> Self {
        Self {
            duration_minutes,
            ..Self::default()
        }
    }

    /// # Errors
    /// `EngineError::InvalidConfig` when a field is zero or above its maximum
    /// ([`MAX_DURATION_MINUTES`], [`MAX_GRANULARITY_MINUTES`], [`MAX_HORIZON_DAYS`]).
    pub fn validate(&self) -> Result<()> {
        check_range("duration_minutes", self.duration_minutes, MAX_DURATION_MINUTES)?;
        check_range("granularity_minutes", self.granularity_minutes, MAX_GRANULARITY_MINUTES)?;
        check_range("horizon_days", self.horizon_days, MAX_HORIZON_DAYS)
    }
}

fn check_range(field: &str, value: u32, max: u32) -> Result<()> {
    if value == 0 || value > max {
        return Err(EngineError::InvalidConfig(format!(
            "{field} must be between 1 and {max}, got {value}"
        )));
    }
    Ok(())
}

/// Start a slot search.
///
/// # Arguments
/// - `window_start` -- Earliest instant the caller wants a slot at
/// - `now` -- Current instant; nothing is placed in the past
/// - `hours` -- Daily working window, repeated every day of the horizon
/// - `search` -- Slot duration, rounding granularity and horizon
/// - `busy` -- Busy intervals in any order, overlaps allowed
///
/// # Errors
/// Returns `EngineError::InvalidConfig` for a duration, granularity or horizon
/// outside its range, or a horizon reaching past the supported date range.
/// Returns `EngineError::AvailabilityExhausted` when not a single slot fits
/// anywhere within the horizon; the returned iterator is therefore never
/// empty on success.
pub fn resolve(
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
    hours: &WorkingHours,
    search: &SearchConfig,
    busy: &[BusyInterval],
) -> Result<Slots> {
    search.validate()?;

    let tz = hours.timezone;
    let effective = window_start.max(now);
    let local = effective.with_timezone(&tz);
    let time = local.time();

    let (date, minute, anchor) = if time >= naive_time(hours.daily_end) {
        // Past today's window: jump to tomorrow's start.
        let next = local.date_naive().succ_opt().ok_or(EngineError::AvailabilityExhausted {
            horizon_days: search.horizon_days,
        })?;
        let start = hours.daily_start.minutes();
        let anchor = local_instant(tz, next, start, effective).unwrap_or(effective);
        debug!(%effective, next_day = %next, "start is past daily end, moving to next day");
        (next, start, anchor)
    } else if time <= naive_time(hours.daily_start) {
        (local.date_naive(), hours.daily_start.minutes(), effective)
    } else {
        let rounded = align_up(ceil_minutes(time), search.granularity_minutes);
        (local.date_naive(), rounded, effective)
    };

    let horizon_end = anchor
        .checked_add_signed(Duration::days(i64::from(search.horizon_days)))
        .ok_or_else(|| {
            EngineError::InvalidConfig("horizon extends past the supported date range".to_string())
        })?;
    let last_date = horizon_end.with_timezone(&tz).date_naive();

    debug!(
        %anchor,
        %horizon_end,
        busy = busy.len(),
        duration = search.duration_minutes,
        "resolving free slots"
    );

    let mut slots = Slots {
        hours: *hours,
        search: *search,
        busy: BusySet::new(busy),
        horizon_end,
        last_date,
        date,
        minute,
        floor: effective,
        pending: None,
        done: false,
    };

    match slots.advance() {
        Some(first) => {
            slots.pending = Some(first);
            Ok(slots)
        }
        None => Err(EngineError::AvailabilityExhausted {
            horizon_days: search.horizon_days,
        }),
    }
}

/// Free slots in strictly increasing start order.
///
/// Produced by [`resolve`]. Single forward pass; pure given its inputs.
#[derive(Debug, Clone)]
pub struct Slots {
    hours: WorkingHours,
    search: SearchConfig,
    busy: BusySet,
    horizon_end: DateTime<Utc>,
    last_date: NaiveDate,
    date: NaiveDate,
    /// Next candidate start, minutes since local midnight of `date`.
    minute: u32,
    /// No candidate may start before this instant.
    floor: DateTime<Utc>,
    pending: Option<Slot>,
    done: bool,
}

impl Slots {
    /// No slot produced by this iterator ends after this instant.
    pub fn horizon_end(&self) -> DateTime<Utc> {
        self.horizon_end
    }

    fn advance(&mut self) -> Option<Slot> {
        let tz = self.hours.timezone;
        let day_end = self.hours.daily_end.minutes();
        let duration = self.search.duration_minutes;

        while !self.done {
            if self.minute + duration > day_end {
                self.roll_over();
                continue;
            }

            // Local times inside a DST gap do not exist.
            let Some(start) = local_instant(tz, self.date, self.minute, self.floor) else {
                self.minute = align_up(self.minute + 1, self.search.granularity_minutes);
                continue;
            };
            if start < self.floor {
                self.minute = align_up(self.minute + 1, self.search.granularity_minutes);
                continue;
            }

            let Some(end) = start.checked_add_signed(Duration::minutes(i64::from(duration))) else {
                self.done = true;
                break;
            };
            let slot = Interval::new(start, end);
            if slot.end > self.horizon_end {
                // Candidates only move forward, so nothing later can fit either.
                self.done = true;
                break;
            }

            if !self.ends_within_window(&slot, day_end) {
                self.roll_over();
                continue;
            }

            match self.busy.first_conflict(&slot).map(|b| b.end) {
                None => {
                    self.resume_at(slot.end, false);
                    return Some(slot);
                }
                Some(blocking_end) => self.resume_at(blocking_end, true),
            }
        }

        None
    }

    /// Continue the scan from `instant`, optionally rounding up to the grid.
    fn resume_at(&mut self, instant: DateTime<Utc>, align: bool) {
        self.floor = instant;
        let local = instant.with_timezone(&self.hours.timezone);
        if local.date_naive() > self.date {
            self.roll_over();
            return;
        }

        // After a fall-back the local minute can be behind the previous
        // candidate; `floor` keeps the scan moving forward in real time.
        let mut minute = ceil_minutes(local.time()).max(self.hours.daily_start.minutes());
        if align {
            minute = align_up(minute, self.search.granularity_minutes);
        }
        self.minute = minute;
    }

    fn roll_over(&mut self) {
        match self.date.succ_opt() {
            Some(next) if next <= self.last_date => {
                debug!(from = %self.date, to = %next, "rolling over to next day");
                self.date = next;
                self.minute = self.hours.daily_start.minutes();
            }
            _ => self.done = true,
        }
    }

    fn ends_within_window(&self, slot: &Slot, day_end: u32) -> bool {
        let end_local = slot.end.with_timezone(&self.hours.timezone);
        end_local.date_naive() == self.date && ceil_minutes(end_local.time()) <= day_end
    }
}

impl Iterator for Slots {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        if let Some(slot) = self.pending.take() {
            return Some(slot);
        }
        self.advance()
    }
}

impl FusedIterator for Slots {}

fn naive_time(t: TimeOfDay) -> NaiveTime {
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap_or(NaiveTime::MIN)
}

/// Minutes since midnight, rounding any leftover seconds up.
fn ceil_minutes(time: NaiveTime) -> u32 {
    let secs = time.num_seconds_from_midnight();
    let partial = secs % 60 != 0 || time.nanosecond() != 0;
    secs / 60 + u32::from(partial)
}

fn align_up(minute: u32, granularity: u32) -> u32 {
    minute.div_ceil(granularity) * granularity
}

/// The instant at `minute` past local midnight of `date`, or `None` when that
/// local time does not exist. An ambiguous time resolves to its earlier
/// instant unless that one is before `floor`.
fn local_instant(
    tz: Tz,
    date: NaiveDate,
    minute: u32,
    floor: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if minute >= MINUTES_PER_DAY {
        return None;
    }
    let naive = date.and_hms_opt(minute / 60, minute % 60, 0)?;
    let instant = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(early, late) => {
            if early.with_timezone(&Utc) >= floor {
                early
            } else {
                late
            }
        }
        LocalResult::None => return None,
    };
    Some(instant.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_grid() {
        assert_eq!(align_up(540, 30), 540);
        assert_eq!(align_up(541, 30), 570);
        assert_eq!(align_up(559, 30), 570);
        assert_eq!(align_up(0, 30), 0);
        assert_eq!(align_up(7, 15), 15);
    }

    #[test]
    fn ceil_minutes_counts_partial_minutes() {
        let t = NaiveTime::from_hms_opt(9, 5, 0).unwrap();
        assert_eq!(ceil_minutes(t), 545);
        let t = NaiveTime::from_hms_opt(9, 5, 1).unwrap();
        assert_eq!(ceil_minutes(t), 546);
        let t = NaiveTime::from_hms_milli_opt(9, 5, 0, 1).unwrap();
        assert_eq!(ceil_minutes(t), 546);
    }

    #[test]
    fn local_instant_skips_dst_gap() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 2026-03-08 02:30 does not exist in New York.
        let date = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        assert!(local_instant(tz, date, 2 * 60 + 30, DateTime::<Utc>::MIN_UTC).is_none());
        assert!(local_instant(tz, date, 3 * 60, DateTime::<Utc>::MIN_UTC).is_some());
    }

    #[test]
    fn local_instant_picks_repeated_hour_after_floor() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 2026-11-01 01:30 happens at 05:30Z (EDT) and again at 06:30Z (EST).
        let date = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
        let first = Utc.with_ymd_and_hms(2026, 11, 1, 5, 30, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 11, 1, 6, 30, 0).unwrap();
        assert_eq!(local_instant(tz, date, 90, DateTime::<Utc>::MIN_UTC), Some(first));
        assert_eq!(local_instant(tz, date, 90, first + Duration::minutes(1)), Some(second));
    }
}
