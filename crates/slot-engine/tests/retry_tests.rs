//! Tests for the retrying sink decorator.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use slot_engine::ports::{EventSink, NewEvent, SinkError};
use slot_engine::retry::{RetryPolicy, RetryingSink};

/// Fails the first `failures` calls with the given error, then succeeds.
struct FlakySink {
    calls: AtomicU32,
    failures: u32,
    error: SinkError,
}

impl FlakySink {
    fn new(failures: u32, error: SinkError) -> Self {
        Self {
            calls: AtomicU32::new(0),
            failures,
            error,
        }
    }
}

#[async_trait]
impl EventSink for FlakySink {
    async fn create_event(&self, _calendar_id: &str, _event: &NewEvent) -> Result<(), SinkError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(self.error.clone())
        } else {
            Ok(())
        }
    }
}

fn event() -> NewEvent {
    let start = Utc.with_ymd_and_hms(2026, 3, 16, 9, 0, 0).unwrap();
    NewEvent {
        title: "Write report".to_string(),
        start,
        end: start + chrono::Duration::minutes(30),
        time_zone: "UTC".to_string(),
        description: None,
    }
}

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(100),
        base: 2.0,
        max_delay: Duration::from_secs(1),
    }
}

#[tokio::test(start_paused = true)]
async fn transport_failures_are_retried_until_success() {
    let sink = RetryingSink::new(
        FlakySink::new(2, SinkError::Transport("timeout".to_string())),
        policy(3),
    );

    let started = tokio::time::Instant::now();
    let result = sink.create_event("primary", &event()).await;

    assert_eq!(result, Ok(()));
    // 100ms + 200ms of backoff.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");
    assert_eq!(sink.into_inner().calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn attempts_are_bounded() {
    let sink = RetryingSink::new(
        FlakySink::new(10, SinkError::Transport("timeout".to_string())),
        policy(3),
    );

    let result = sink.create_event("primary", &event()).await;

    assert_eq!(result, Err(SinkError::Transport("timeout".to_string())));
    assert_eq!(sink.into_inner().calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn rejections_are_not_retried() {
    let sink = RetryingSink::new(
        FlakySink::new(1, SinkError::Rejected("invalid title".to_string())),
        policy(5),
    );

    let result = sink.create_event("primary", &event()).await;

    assert_eq!(result, Err(SinkError::Rejected("invalid title".to_string())));
    assert_eq!(sink.into_inner().calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn single_attempt_policy_never_retries() {
    let sink = RetryingSink::new(
        FlakySink::new(1, SinkError::Transport("timeout".to_string())),
        policy(1),
    );

    let result = sink.create_event("primary", &event()).await;

    assert!(result.is_err());
    assert_eq!(sink.into_inner().calls.load(Ordering::SeqCst), 1);
}
