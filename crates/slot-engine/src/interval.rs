//! Half-open time intervals and busy-set normalization.
//!
//! Two intervals overlap when `a.start < b.end && b.start < a.end`.
//! Adjacent intervals (one ends exactly when the other starts) do NOT overlap.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A `[start, end)` range of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A period already occupied on a calendar, as reported by a busy source.
pub type BusyInterval = Interval;

/// A free range of fixed duration proposed for one task.
pub type Slot = Interval;

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Interval of `minutes` length starting at `start`.
    pub fn starting_at(start: DateTime<Utc>, minutes: u32) -> Self {
        Self {
            start,
            end: start + Duration::minutes(i64::from(minutes)),
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Standard half-open intersection test; touching boundaries are not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A busy set normalized for lookup: sorted by start, non-overlapping,
/// empty intervals discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusySet {
    merged: Vec<Interval>,
}

impl BusySet {
    /// Normalize an arbitrary (unsorted, possibly overlapping) busy list.
    pub fn new(busy: &[BusyInterval]) -> Self {
        let mut intervals: Vec<Interval> = busy.iter().copied().filter(|b| !b.is_empty()).collect();

        // Sort by start time (then by end time for stability).
        intervals.sort_by_key(|b| (b.start, b.end));

        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            if let Some(last) = merged.last_mut() {
                if interval.start <= last.end {
                    // Overlapping or adjacent: extend the current interval.
                    last.end = last.end.max(interval.end);
                    continue;
                }
            }
            merged.push(interval);
        }

        Self { merged }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.merged
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    /// The busy interval blocking `candidate`, if any.
    ///
    /// Because merged intervals are disjoint and sorted, only the first one
    /// ending after `candidate.start` can overlap it.
    pub fn first_conflict(&self, candidate: &Interval) -> Option<&Interval> {
        let idx = self.merged.partition_point(|b| b.end <= candidate.start);
        self.merged.get(idx).filter(|b| b.overlaps(candidate))
    }
}
