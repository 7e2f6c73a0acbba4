//! InMemoryEventSender - records outbound events instead of delivering them
//!
//! # Usage
//! - development runs without a broker
//! - tests that assert on the emitted lifecycle events

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::{SendError, TaskEvent, TransportError};
use crate::ports::{EventSender, Transport};

/// InMemoryEventSender keeps every event it was asked to send, in order
///
/// It also implements `Transport`, so it can sit under a `RetryingSender`.
#[derive(Debug, Default)]
pub struct InMemoryEventSender {
    events: Mutex<Vec<TaskEvent>>,
    fail_with: Mutex<Option<String>>,
}

impl InMemoryEventSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every following send fails with `message` until `recover` is called.
    pub fn fail_with(&self, message: impl Into<String>) {
        *lock(&self.fail_with) = Some(message.into());
    }

    pub fn recover(&self) {
        *lock(&self.fail_with) = None;
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        lock(&self.events).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }

    /// Types of the recorded events, in send order.
    pub fn event_types(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .map(|e| e.event_type().unwrap_or_default().to_string())
            .collect()
    }

    fn record(&self, event: TaskEvent) -> Result<(), TransportError> {
        if let Some(message) = lock(&self.fail_with).clone() {
            return Err(TransportError::new(message));
        }
        lock(&self.events).push(event);
        Ok(())
    }
}

#[async_trait]
impl Transport for InMemoryEventSender {
    async fn deliver(&self, event: &TaskEvent) -> Result<(), TransportError> {
        self.record(event.clone())
    }
}

#[async_trait]
impl EventSender for InMemoryEventSender {
    async fn send(&self, event: TaskEvent) -> Result<(), SendError> {
        self.record(event)
            .map_err(|source| SendError::DeliveryFailed {
                attempts: 1,
                source,
            })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
