//! ChannelControlPlane - in-process control plane fed by an mpsc channel
//!
//! Stands in for the broker subscription during development and in tests:
//! whatever is pushed into the channel is delivered to the integration.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::app::EventContext;
use crate::domain::TaskEvent;
use crate::ports::{ControlPlane, ControlPlaneError, EventSender, Integration};

pub struct ChannelControlPlane {
    integration_id: String,
    sender: Arc<dyn EventSender>,
    events: Mutex<Option<mpsc::Receiver<TaskEvent>>>,
}

impl ChannelControlPlane {
    /// Returns the control plane and the sending half of its feed.
    pub fn new(
        sender: Arc<dyn EventSender>,
        capacity: usize,
    ) -> (Self, mpsc::Sender<TaskEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        let control_plane = Self {
            integration_id: uuid::Uuid::new_v4().to_string(),
            sender,
            events: Mutex::new(Some(rx)),
        };
        (control_plane, tx)
    }

    pub fn with_integration_id(mut self, id: impl Into<String>) -> Self {
        self.integration_id = id.into();
        self
    }

    pub fn integration_id(&self) -> &str {
        &self.integration_id
    }
}

#[async_trait]
impl ControlPlane for ChannelControlPlane {
    async fn register(
        &self,
        integration: &dyn Integration,
        ctx: EventContext,
    ) -> Result<(), ControlPlaneError> {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| ControlPlaneError::AlreadyRegistered(self.integration_id.clone()))?;

        let registration = integration.registration_data();
        info!(
            integration_id = %self.integration_id,
            name = %registration.name,
            subscriptions = registration.subscriptions.len(),
            "integration registered"
        );

        let ctx = ctx
            .with_sender(self.sender.clone())
            .with_integration_id(self.integration_id.clone());
        let cancellation = ctx.cancellation().clone();

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    info!("subscription cancelled");
                    break;
                }
                next = events.recv() => match next {
                    Some(event) => {
                        debug!(event_id = %event.id, "event received");
                        integration.on_event(&ctx, event).await;
                    }
                    None => {
                        info!("event feed closed");
                        break;
                    }
                },
            }
        }
        Ok(())
    }
}
