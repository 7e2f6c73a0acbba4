//! TaskHandle - what filters and handlers get besides the event
//!
//! Handlers that opt out of automatic responses use it to emit their own
//! lifecycle events through the same sender the dispatcher uses.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::factory::{ConstructionError, EventFactory};
use crate::domain::{DecodedEvent, SendError};
use crate::ports::EventSender;

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("could not create event: {0}")]
    Construction(#[from] ConstructionError),

    #[error("could not send event: {0}")]
    Send(#[from] SendError),
}

#[derive(Clone)]
pub struct TaskHandle {
    sender: Arc<dyn EventSender>,
    factory: EventFactory,
}

impl TaskHandle {
    pub fn new(sender: Arc<dyn EventSender>, factory: EventFactory) -> Self {
        Self { sender, factory }
    }

    /// Source name this worker stamps on its events.
    pub fn source(&self) -> &str {
        self.factory.source()
    }

    pub async fn send_started_event(&self, parent: &DecodedEvent) -> Result<(), HandleError> {
        let event = self.factory.started(parent)?;
        self.sender.send(event).await?;
        Ok(())
    }

    pub async fn send_status_changed_event(
        &self,
        parent: &DecodedEvent,
        payload: Value,
    ) -> Result<(), HandleError> {
        let event = self.factory.status_changed(parent, payload)?;
        self.sender.send(event).await?;
        Ok(())
    }

    pub async fn send_finished_event(
        &self,
        parent: &DecodedEvent,
        payload: Value,
    ) -> Result<(), HandleError> {
        let event = self.factory.finished(parent, payload)?;
        self.sender.send(event).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskEvent;
    use crate::impls::InMemoryEventSender;
    use serde_json::json;

    fn parent() -> DecodedEvent {
        let event = TaskEvent::builder(
            "sh.keptn.event.approval.triggered",
            json!({"project": "p", "stage": "s", "service": "svc"}),
        )
        .with_keptn_context("ctx")
        .build()
        .unwrap();
        DecodedEvent::decode(event).unwrap()
    }

    #[tokio::test]
    async fn manual_lifecycle_goes_through_sender() {
        let sender = Arc::new(InMemoryEventSender::new());
        let handle = TaskHandle::new(sender.clone(), EventFactory::new("approver"));
        let parent = parent();

        handle.send_started_event(&parent).await.unwrap();
        handle
            .send_status_changed_event(&parent, json!({"approval": "pending"}))
            .await
            .unwrap();
        handle
            .send_finished_event(&parent, json!({"approval": "granted"}))
            .await
            .unwrap();

        assert_eq!(
            sender.event_types(),
            vec![
                "sh.keptn.event.approval.started",
                "sh.keptn.event.approval.status.changed",
                "sh.keptn.event.approval.finished",
            ]
        );
        assert!(sender.events().iter().all(|e| e.shkeptncontext == "ctx"));
        assert_eq!(handle.source(), "approver");
    }

    #[tokio::test]
    async fn send_failure_is_reported() {
        let sender = Arc::new(InMemoryEventSender::new());
        sender.fail_with("bus offline");
        let handle = TaskHandle::new(sender, EventFactory::new("approver"));

        let err = handle.send_started_event(&parent()).await.unwrap_err();
        assert!(matches!(err, HandleError::Send(_)));
    }
}
