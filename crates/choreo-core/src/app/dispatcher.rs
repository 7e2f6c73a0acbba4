//! Dispatcher - runs one inbound event through its task handler
//!
//! # Flow per event
//! 1. validate (sender, type, wait counter) and acquire an in-flight guard
//! 2. lookup -> decode -> filters
//! 3. `.started` (automatic response, triggered events only)
//! 4. handler
//! 5. `.finished` / error `.finished`, or nothing
//!
//! Steps 2-5 run on their own tokio task unless sync processing is enabled.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::context::EventContext;
use super::factory::{ConstructionError, EventFactory};
use super::handle::TaskHandle;
use crate::domain::{
    DecodeError, DecodedEvent, EventTypeError, SendError, TaskEvent, is_task_event_type,
};
use crate::ports::EventSender;
use crate::typed::TaskRegistry;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no event sender in context")]
    MissingEventSender,

    #[error("event {id} has no type")]
    MissingEventType { id: String },

    #[error(transparent)]
    InvalidEventType(#[from] EventTypeError),

    #[error("no wait counter in context")]
    MissingWaitCounter,

    #[error("event {id} has an undecodable payload: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not create {kind} event: {source}")]
    Construction {
        kind: &'static str,
        #[source]
        source: ConstructionError,
    },

    #[error("could not send {kind} event: {source}")]
    Send {
        kind: &'static str,
        #[source]
        source: SendError,
    },
}

impl From<DecodeError> for DispatchError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::MissingType { id } => DispatchError::MissingEventType { id },
            DecodeError::InvalidType(err) => DispatchError::InvalidEventType(err),
            DecodeError::InvalidPayload { id, source } => DispatchError::Decode { id, source },
        }
    }
}

/// How a dispatched event ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No handler registered for the event type.
    NoHandler,
    /// A filter rejected the event.
    Filtered,
    /// Payload could not be decoded; an error-log event was sent.
    Malformed,
    /// The handler ran.
    Executed { failed: bool, finished_sent: bool },
}

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    registry: TaskRegistry,
    factory: EventFactory,
    automatic_response: bool,
    sync_processing: bool,
}

impl Dispatcher {
    pub fn new(
        registry: TaskRegistry,
        factory: EventFactory,
        automatic_response: bool,
        sync_processing: bool,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                factory,
                automatic_response,
                sync_processing,
            }),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.inner.registry
    }

    /// Entry point for the control plane. Never fails; problems are logged.
    pub async fn on_event(&self, ctx: &EventContext, event: TaskEvent) {
        let event_id = event.id.clone();
        if let Err(err) = self.accept(ctx, event).await {
            error!(event_id = %event_id, error = %err, "dropping inbound event");
        }
    }

    async fn accept(&self, ctx: &EventContext, event: TaskEvent) -> Result<(), DispatchError> {
        let sender = ctx
            .sender()
            .cloned()
            .ok_or(DispatchError::MissingEventSender)?;
        let event_type = event
            .event_type()
            .ok_or_else(|| DispatchError::MissingEventType {
                id: event.id.clone(),
            })?;
        if !is_task_event_type(event_type) {
            return Err(EventTypeError::Malformed(event_type.to_string()).into());
        }
        let counter = ctx
            .wait_counter()
            .ok_or(DispatchError::MissingWaitCounter)?;

        let guard = counter.acquire();
        let integration_id = ctx.integration_id().to_string();

        if self.inner.sync_processing {
            let _guard = guard;
            self.run(sender, &integration_id, event).await;
        } else {
            let this = self.clone();
            tokio::spawn(async move {
                let _guard = guard;
                this.run(sender, &integration_id, event).await;
            });
        }
        Ok(())
    }

    async fn run(&self, sender: Arc<dyn EventSender>, integration_id: &str, event: TaskEvent) {
        let event_id = event.id.clone();
        match self.dispatch(sender, integration_id, event).await {
            Ok(outcome) => debug!(event_id = %event_id, ?outcome, "event dispatched"),
            Err(err) => error!(event_id = %event_id, error = %err, "event dispatch failed"),
        }
    }

    /// Runs lookup, decode, filters, handler and responses for one event.
    pub async fn dispatch(
        &self,
        sender: Arc<dyn EventSender>,
        integration_id: &str,
        event: TaskEvent,
    ) -> Result<DispatchOutcome, DispatchError> {
        let factory = &self.inner.factory;
        let event_type = event
            .event_type()
            .ok_or_else(|| DispatchError::MissingEventType {
                id: event.id.clone(),
            })?;

        let Some(entry) = self.inner.registry.lookup(event_type) else {
            debug!(event_id = %event.id, event_type, "no handler registered");
            return Ok(DispatchOutcome::NoHandler);
        };

        let decoded = match DecodedEvent::decode(event.clone()) {
            Ok(decoded) => decoded,
            Err(DecodeError::InvalidPayload { source, .. }) => {
                error!(event_id = %event.id, event_type, error = %source, "could not decode event payload");
                let log_event = factory.error_log(&event, integration_id, &source.to_string());
                sender
                    .send(log_event)
                    .await
                    .map_err(|source| DispatchError::Send {
                        kind: "error log",
                        source,
                    })?;
                return Ok(DispatchOutcome::Malformed);
            }
            Err(err) => return Err(err.into()),
        };

        let handle = TaskHandle::new(sender.clone(), factory.clone());

        // every filter runs, even after one has rejected
        let rejected = entry
            .options
            .filters
            .iter()
            .map(|filter| filter(&handle, &decoded))
            .filter(|accepted| !accepted)
            .count();
        if rejected > 0 {
            info!(event_id = decoded.id(), event_type, rejected, "will not handle event");
            return Ok(DispatchOutcome::Filtered);
        }

        let auto_response =
            self.inner.automatic_response && !entry.options.skip_automatic_response;
        let triggered = decoded.event_type().is_triggered();
        let respond = auto_response && triggered;

        if respond {
            let started = factory
                .started(&decoded)
                .map_err(|source| DispatchError::Construction {
                    kind: "started",
                    source,
                })?;
            sender
                .send(started)
                .await
                .map_err(|source| DispatchError::Send {
                    kind: "started",
                    source,
                })?;
        }

        match entry.handler.execute(&handle, &decoded).await {
            Err(task_error) => {
                error!(
                    event_id = decoded.id(),
                    task = decoded.task(),
                    status = ?task_error.status,
                    result = ?task_error.result,
                    error = %task_error,
                    "task handler failed"
                );
                if !respond {
                    return Ok(DispatchOutcome::Executed {
                        failed: true,
                        finished_sent: false,
                    });
                }
                let finished = factory
                    .error_finished(&decoded, &task_error)
                    .map_err(|source| DispatchError::Construction {
                        kind: "error finished",
                        source,
                    })?;
                sender
                    .send(finished)
                    .await
                    .map_err(|source| DispatchError::Send {
                        kind: "error finished",
                        source,
                    })?;
                Ok(DispatchOutcome::Executed {
                    failed: true,
                    finished_sent: true,
                })
            }
            Ok(None) => {
                info!(event_id = decoded.id(), task = decoded.task(), "no finished data set by task handler");
                Ok(DispatchOutcome::Executed {
                    failed: false,
                    finished_sent: false,
                })
            }
            Ok(Some(payload)) => {
                if !respond {
                    if auto_response {
                        warn!(event_id = decoded.id(), event_type, "not answering a non-triggered event");
                    }
                    return Ok(DispatchOutcome::Executed {
                        failed: false,
                        finished_sent: false,
                    });
                }
                let finished = factory
                    .finished(&decoded, payload)
                    .map_err(|source| DispatchError::Construction {
                        kind: "finished",
                        source,
                    })?;
                sender
                    .send(finished)
                    .await
                    .map_err(|source| DispatchError::Send {
                        kind: "finished",
                        source,
                    })?;
                Ok(DispatchOutcome::Executed {
                    failed: false,
                    finished_sent: true,
                })
            }
        }
    }
}
