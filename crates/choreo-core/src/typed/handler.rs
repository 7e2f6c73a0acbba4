//! Handler traits - what runs when a task event arrives
//!
//! # Key points
//! - Object-safe `TaskHandler` works on the decoded event and raw JSON payload
//! - Generic `Handler<T>` receives a typed payload
//! - Type erasure (`TypedHandler<T, H>` -> `TaskHandler`) so both can live in one registry

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::task::TaskData;
use crate::app::TaskHandle;
use crate::domain::{DecodedEvent, ResultType, StatusType, TaskError};

/// `Ok(Some(payload))` becomes the `.finished` payload, `Ok(None)` sends nothing.
pub type TaskResult = Result<Option<Value>, TaskError>;

/// TaskHandler executes one task event
///
/// # Object Safety
/// - no generic methods, stored as `Arc<dyn TaskHandler>`
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self, handle: &TaskHandle, event: &DecodedEvent) -> TaskResult;
}

/// Handler receives the payload already decoded into `T`
///
/// # Example
/// ```ignore
/// struct DeploymentHandler;
///
/// #[async_trait]
/// impl Handler<Deployment> for DeploymentHandler {
///     type Output = DeploymentFinished;
///
///     async fn handle(&self, _: &TaskHandle, _: &DecodedEvent, task: Deployment)
///         -> Result<Option<DeploymentFinished>, TaskError> {
///         Ok(Some(DeploymentFinished { uri: deploy(&task.image).await? }))
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<T: TaskData>: Send + Sync {
    type Output: Serialize + Send;

    async fn handle(
        &self,
        handle: &TaskHandle,
        event: &DecodedEvent,
        task: T,
    ) -> Result<Option<Self::Output>, TaskError>;
}

pub struct TypedHandler<T, H> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TaskData, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: TaskData, H: Handler<T>> TaskHandler for TypedHandler<T, H> {
    async fn execute(&self, handle: &TaskHandle, event: &DecodedEvent) -> TaskResult {
        let task: T = event.decode_data().map_err(|e| {
            TaskError::errored(format!("could not decode {} payload: {e}", T::TASK))
                .with_source(e)
        })?;

        let output = self.handler.handle(handle, event, task).await?;
        output
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| {
                TaskError::new(
                    StatusType::Unknown,
                    ResultType::Fail,
                    format!("could not encode {} result: {e}", T::TASK),
                )
                .with_source(e)
            })
    }
}

/// Decides whether a registered handler takes an event; all filters must agree.
pub type EventFilter = Arc<dyn Fn(&TaskHandle, &DecodedEvent) -> bool + Send + Sync>;

pub fn filter<F>(f: F) -> EventFilter
where
    F: Fn(&TaskHandle, &DecodedEvent) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Per-handler registration options.
#[derive(Clone, Default)]
pub struct TaskHandlerOptions {
    pub filters: Vec<EventFilter>,
    pub skip_automatic_response: bool,
}

impl TaskHandlerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_filters(mut self, filters: impl IntoIterator<Item = EventFilter>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// The handler sends its own lifecycle events through its `TaskHandle`.
    pub fn skip_automatic_response(mut self) -> Self {
        self.skip_automatic_response = true;
        self
    }
}

impl std::fmt::Debug for TaskHandlerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandlerOptions")
            .field("filters", &self.filters.len())
            .field("skip_automatic_response", &self.skip_automatic_response)
            .finish()
    }
}
