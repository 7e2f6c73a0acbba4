//! RetryingSender - EventSender over a Transport with jittered backoff
//!
//! The delay is slept inside the caller's task, so a slow bus slows down the
//! dispatch unit that is sending.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::retry::RetryPolicy;
use crate::domain::{SendError, TaskEvent, TransportError};
use crate::ports::{EventSender, Transport};

pub struct RetryingSender<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingSender<T> {
    pub fn new(transport: T) -> Self {
        Self::with_policy(transport, RetryPolicy::default())
    }

    pub fn with_policy(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<T: Transport> EventSender for RetryingSender<T> {
    async fn send(&self, event: TaskEvent) -> Result<(), SendError> {
        let max_attempts = self.policy.max_attempts();
        let mut last_error: Option<TransportError> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.policy.next_delay(attempt - 1);
                debug!(event_id = %event.id, attempt, ?delay, "retrying event delivery");
                tokio::time::sleep(delay).await;
            }

            match self.transport.deliver(&event).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(
                        event_id = %event.id,
                        event_type = event.event_type().unwrap_or_default(),
                        attempt,
                        max_attempts,
                        error = %err,
                        "event delivery failed"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(SendError::DeliveryFailed {
            attempts: max_attempts,
            source: last_error
                .unwrap_or_else(|| TransportError::new("no delivery attempt was made")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    /// Fails the first `failures` tries, recording when each try happened.
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
        seen_at: Mutex<Vec<Instant>>,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                seen_at: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn deliver(&self, _event: &TaskEvent) -> Result<(), TransportError> {
            self.seen_at.lock().unwrap().push(Instant::now());
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(TransportError::new(format!("broker down (call {call})")))
            } else {
                Ok(())
            }
        }
    }

    fn event() -> TaskEvent {
        TaskEvent::builder(
            "sh.keptn.event.test.started",
            json!({"project": "p", "stage": "s", "service": "svc"}),
        )
        .build()
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn success_is_not_retried() {
        let sender = RetryingSender::new(FlakyTransport::new(0));
        sender.send(event()).await.unwrap();
        assert_eq!(sender.transport().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let sender = RetryingSender::new(FlakyTransport::new(2));
        sender.send(event()).await.unwrap();
        assert_eq!(sender.transport().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_four_tries() {
        let sender = RetryingSender::new(FlakyTransport::new(u32::MAX));

        let err = sender.send(event()).await.unwrap_err();

        let SendError::DeliveryFailed { attempts, source } = err;
        assert_eq!(attempts, 4);
        assert_eq!(source.message(), "broker down (call 4)");
        assert_eq!(sender.transport().calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_within_backoff_window_between_tries() {
        let sender = RetryingSender::new(FlakyTransport::new(u32::MAX));
        let _ = sender.send(event()).await;

        let seen = sender.transport().seen_at.lock().unwrap().clone();
        assert_eq!(seen.len(), 4);
        for (i, pair) in seen.windows(2).enumerate() {
            let retry = i as u32 + 1;
            let waited = pair[1] - pair[0];
            let (min, max) = sender.policy().delay_bounds(retry);
            // paused clock granularity is one millisecond
            assert!(waited + Duration::from_millis(1) >= min, "retry {retry}: {waited:?}");
            assert!(waited <= max + Duration::from_millis(1), "retry {retry}: {waited:?}");
        }
    }
}
