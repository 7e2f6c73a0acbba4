//! EventSender port - emits lifecycle events onto the event bus
//!
//! The control plane hands an `EventSender` to the runtime through the
//! inbound `EventContext`. Every event a dispatch unit emits goes through it.

use async_trait::async_trait;

use crate::domain::{SendError, TaskEvent};

/// EventSender delivers outbound events
///
/// # Thread Safety
/// - shared as `Arc<dyn EventSender>` by every in-flight dispatch unit
#[async_trait]
pub trait EventSender: Send + Sync {
    async fn send(&self, event: TaskEvent) -> Result<(), SendError>;
}
