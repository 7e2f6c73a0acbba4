//! ControlPlane port - subscription side of the event bus
//!
//! The control plane owns the subscription: it registers the integration,
//! receives events and calls `Integration::on_event` for each of them with an
//! `EventContext` carrying its event sender.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::EventContext;
use crate::domain::TaskEvent;

/// Callbacks a worker exposes to the control plane.
#[async_trait]
pub trait Integration: Send + Sync {
    async fn on_event(&self, ctx: &EventContext, event: TaskEvent);

    fn registration_data(&self) -> RegistrationData;
}

#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Registers `integration` and feeds it events until `ctx` is cancelled or
    /// the subscription ends.
    async fn register(
        &self,
        integration: &dyn Integration,
        ctx: EventContext,
    ) -> Result<(), ControlPlaneError>;
}

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("integration {0} is already registered")]
    AlreadyRegistered(String),
}

/// What the worker announces when it registers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationData {
    pub name: String,
    pub metadata: IntegrationMetadata,
    pub subscriptions: Vec<EventSubscription>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationMetadata {
    pub hostname: String,
    #[serde(rename = "integrationversion")]
    pub integration_version: String,
    pub location: String,
    #[serde(rename = "kubernetesmetadata")]
    pub kubernetes: KubernetesMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesMetadata {
    pub namespace: String,
    #[serde(rename = "podname")]
    pub pod_name: String,
    #[serde(rename = "deploymentname")]
    pub deployment_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubscription {
    pub event: String,
}
