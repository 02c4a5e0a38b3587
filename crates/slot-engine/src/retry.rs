//! Bounded retry with exponential backoff around an [`EventSink`].
//!
//! Only transport failures are retried. A rejection is the backend's answer
//! and is returned as-is. Because sinks are not idempotent, a transport
//! failure after the request arrived can still produce a duplicate event.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::ports::{EventSink, NewEvent, SinkError};

/// Backoff schedule: `initial_delay * base^attempt`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub base: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            base: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay.as_millis() as f64 * self.base.powi(attempt as i32);
        let delay_ms = delay.min(self.max_delay.as_millis() as f64) as u64;
        Duration::from_millis(delay_ms)
    }
}

/// An [`EventSink`] that retries transport failures of `inner`.
#[derive(Debug, Clone)]
pub struct RetryingSink<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetryingSink<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: EventSink> EventSink for RetryingSink<S> {
    async fn create_event(&self, calendar_id: &str, event: &NewEvent) -> Result<(), SinkError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.inner.create_event(calendar_id, event).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transport() && attempt + 1 < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        title = %event.title,
                        attempt = attempt + 1,
                        max_attempts,
                        ?delay,
                        error = %err,
                        "event creation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            base: 2.0,
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for(10), Duration::from_millis(500));
    }
}
