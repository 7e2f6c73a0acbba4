//! Runtime - the worker side of the control-plane contract
//!
//! # Lifecycle
//! 1. `start()` installs the signal handler
//! 2. registers with the control plane, which feeds events until cancelled
//! 3. drains in-flight events, then returns

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::context::EventContext;
use super::dispatcher::Dispatcher;
use super::shutdown::{ShutdownCoordinator, WaitCounter};
use crate::config::{EnvConfig, RuntimeConfig};
use crate::domain::TaskEvent;
use crate::ports::{ControlPlane, ControlPlaneError, Integration, RegistrationData};

pub struct Runtime {
    source: String,
    dispatcher: Dispatcher,
    shutdown: ShutdownCoordinator,
    config: RuntimeConfig,
    env: EnvConfig,
}

impl Runtime {
    pub(crate) fn new(
        source: String,
        dispatcher: Dispatcher,
        shutdown: ShutdownCoordinator,
        config: RuntimeConfig,
        env: EnvConfig,
    ) -> Self {
        Self {
            source,
            dispatcher,
            shutdown,
            config,
            env,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Cancelling this token stops intake; in-flight events still finish.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.token()
    }

    pub fn wait_counter(&self) -> WaitCounter {
        self.shutdown.counter()
    }

    /// Context every inbound event starts from.
    pub fn base_context(&self) -> EventContext {
        EventContext::new(self.shutdown.token()).with_wait_counter(self.shutdown.counter())
    }

    /// Registers with `control_plane` and serves events until it returns,
    /// then waits for in-flight events.
    pub async fn start<C>(&self, control_plane: &C) -> Result<(), ControlPlaneError>
    where
        C: ControlPlane + ?Sized,
    {
        let signals = self.shutdown.install_signal_handler();
        info!(
            source = %self.source,
            tasks = ?self.dispatcher.registry().registered_types(),
            "registering with control plane"
        );

        let result = control_plane.register(self, self.base_context()).await;

        self.shutdown.drain().await;
        signals.abort();
        info!(source = %self.source, "runtime stopped");
        result
    }
}

#[async_trait]
impl Integration for Runtime {
    async fn on_event(&self, ctx: &EventContext, event: TaskEvent) {
        self.dispatcher.on_event(ctx, event).await;
    }

    fn registration_data(&self) -> RegistrationData {
        self.env.registration_data(&self.source)
    }
}
