//! EventContext - what travels with every inbound event
//!
//! The runtime seeds it with the cancellation token and wait counter; the
//! control plane adds its event sender and integration id.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::shutdown::WaitCounter;
use crate::ports::EventSender;

#[derive(Clone, Default)]
pub struct EventContext {
    sender: Option<Arc<dyn EventSender>>,
    wait_counter: Option<WaitCounter>,
    integration_id: String,
    cancellation: CancellationToken,
}

impl EventContext {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            ..Self::default()
        }
    }

    pub fn with_sender(mut self, sender: Arc<dyn EventSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_wait_counter(mut self, counter: WaitCounter) -> Self {
        self.wait_counter = Some(counter);
        self
    }

    pub fn with_integration_id(mut self, id: impl Into<String>) -> Self {
        self.integration_id = id.into();
        self
    }

    pub fn sender(&self) -> Option<&Arc<dyn EventSender>> {
        self.sender.as_ref()
    }

    pub fn wait_counter(&self) -> Option<&WaitCounter> {
        self.wait_counter.as_ref()
    }

    pub fn integration_id(&self) -> &str {
        &self.integration_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl std::fmt::Debug for EventContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventContext")
            .field("has_sender", &self.sender.is_some())
            .field("wait_counter", &self.wait_counter)
            .field("integration_id", &self.integration_id)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}
