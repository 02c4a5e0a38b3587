//! Property-based tests for slot resolution using proptest.
//!
//! These tests verify invariants that should hold for *any* busy set and
//! working window, not just the specific examples in `resolver_tests.rs`.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use proptest::prelude::*;
use slot_engine::interval::{BusyInterval, Interval, Slot};
use slot_engine::resolver::{resolve, SearchConfig, WorkingHours};
use slot_engine::{EngineError, TimeOfDay};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Search inputs that share one base date.
#[derive(Debug, Clone)]
struct Case {
    now: DateTime<Utc>,
    hours: WorkingHours,
    search: SearchConfig,
    busy: Vec<BusyInterval>,
}

/// Base dates a few days before the 2026 US and EU DST transitions
/// (Mar 8, Mar 29, Oct 25, Nov 1), plus a quiet week.
fn arb_base() -> impl Strategy<Value = DateTime<Utc>> {
    prop_oneof![
        Just(Utc.with_ymd_and_hms(2026, 3, 16, 0, 0, 0).unwrap()),
        Just(Utc.with_ymd_and_hms(2026, 3, 6, 0, 0, 0).unwrap()),
        Just(Utc.with_ymd_and_hms(2026, 3, 27, 0, 0, 0).unwrap()),
        Just(Utc.with_ymd_and_hms(2026, 10, 23, 0, 0, 0).unwrap()),
        Just(Utc.with_ymd_and_hms(2026, 10, 30, 0, 0, 0).unwrap()),
    ]
}

fn arb_tz() -> impl Strategy<Value = Tz> {
    prop_oneof![
        Just(Tz::UTC),
        Just(chrono_tz::America::New_York),
        Just(chrono_tz::Europe::London),
    ]
}

/// Busy intervals as (minutes after base, length): anywhere in the first ten
/// days, 5 minutes to 6 hours long.
fn arb_busy_offsets() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec((0i64..10 * 24 * 60, 5i64..=360), 0..40)
}

/// Daily windows on a 15-minute grid, possibly inverted or empty.
fn arb_hours() -> impl Strategy<Value = WorkingHours> {
    (0u32..96, 0u32..96, arb_tz()).prop_map(|(s, e, tz)| {
        let start = TimeOfDay::new(s / 4, (s % 4) * 15).unwrap();
        let end = TimeOfDay::new(e / 4, (e % 4) * 15).unwrap();
        WorkingHours::new(start, end).in_timezone(tz)
    })
}

fn arb_search() -> impl Strategy<Value = SearchConfig> {
    (
        prop_oneof![Just(15u32), Just(30), Just(45), Just(60), Just(90)],
        prop_oneof![Just(15u32), Just(30)],
        1u32..=7,
    )
        .prop_map(|(duration_minutes, granularity_minutes, horizon_days)| SearchConfig {
            duration_minutes,
            granularity_minutes,
            horizon_days,
        })
}

/// "now" somewhere in the first two days after the base, at minute resolution.
fn arb_case() -> impl Strategy<Value = Case> {
    (
        arb_base(),
        0i64..2 * 24 * 60,
        arb_hours(),
        arb_search(),
        arb_busy_offsets(),
    )
        .prop_map(|(base, now_offset, hours, search, raw)| {
            let busy = raw
                .into_iter()
                .map(|(offset, len)| {
                    let start = base + Duration::minutes(offset);
                    Interval::new(start, start + Duration::minutes(len))
                })
                .collect();
            Case {
                now: base + Duration::minutes(now_offset),
                hours,
                search,
                busy,
            }
        })
}

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    }
}

fn minutes_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

fn collect(case: &Case) -> Option<Vec<Slot>> {
    resolve(case.now, case.now, &case.hours, &case.search, &case.busy)
        .ok()
        .map(|s| s.collect())
}

// ---------------------------------------------------------------------------
// P1: No slot overlaps a busy interval
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn slots_never_overlap_busy(case in arb_case()) {
        if let Some(slots) = collect(&case) {
            for slot in &slots {
                for b in &case.busy {
                    prop_assert!(!slot.overlaps(b), "slot {:?} overlaps busy {:?}", slot, b);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// P2: Every slot lies within a day's working window and is never in the past
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn slots_stay_inside_daily_window(case in arb_case()) {
        let tz = case.hours.timezone;
        if let Some(slots) = collect(&case) {
            for slot in &slots {
                let start = slot.start.with_timezone(&tz);
                let end = slot.end.with_timezone(&tz);
                prop_assert_eq!(start.date_naive(), end.date_naive());
                prop_assert!(minutes_of_day(start.time()) >= case.hours.daily_start.minutes());
                prop_assert!(minutes_of_day(end.time()) <= case.hours.daily_end.minutes());
                prop_assert!(slot.start >= case.now, "slot {:?} is before now {}", slot, case.now);
                prop_assert_eq!(slot.duration_minutes(), i64::from(case.search.duration_minutes));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// P3: Strictly increasing, mutually disjoint slots
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn slots_are_strictly_increasing_and_disjoint(case in arb_case()) {
        if let Some(slots) = collect(&case) {
            for pair in slots.windows(2) {
                prop_assert!(pair[0].start < pair[1].start);
                prop_assert!(pair[0].end <= pair[1].start, "{:?} overlaps {:?}", pair[0], pair[1]);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// P4: Bounded by the horizon; empty windows always exhaust
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn slots_end_within_horizon(case in arb_case()) {
        if let Ok(slots) = resolve(case.now, case.now, &case.hours, &case.search, &case.busy) {
            let horizon_end = slots.horizon_end();
            // One extra day allows for a start that jumped to tomorrow, one
            // extra hour for a 25-hour fall-back day.
            let limit = case.now
                + Duration::days(i64::from(case.search.horizon_days) + 1)
                + Duration::hours(1);
            prop_assert!(horizon_end <= limit);
            for slot in slots {
                prop_assert!(slot.end <= horizon_end);
            }
        }
    }

    #[test]
    fn window_shorter_than_duration_exhausts(case in arb_case()) {
        prop_assume!(case.hours.length_minutes() < case.search.duration_minutes);
        let result = resolve(case.now, case.now, &case.hours, &case.search, &[]);
        prop_assert!(
            matches!(result, Err(EngineError::AvailabilityExhausted { .. })),
            "expected exhaustion for {:?}",
            case.hours
        );
    }
}
