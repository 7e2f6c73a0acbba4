//! RuntimeBuilder - registration API and wiring
//!
//! # Key points
//! - Builder pattern; the registry is only mutable before `build()`
//! - Fail-fast startup validation (`expect_tasks`)

use std::sync::Arc;

use super::dispatcher::Dispatcher;
use super::factory::EventFactory;
use super::runtime::Runtime;
use super::shutdown::ShutdownCoordinator;
use crate::config::{ConfigError, EnvConfig, RuntimeConfig};
use crate::ports::{Clock, IdGenerator, SystemClock, UuidGenerator};
use crate::typed::{EventFilter, Handler, TaskData, TaskHandler, TaskHandlerOptions, TaskRegistry};

/// RuntimeBuilder assembles a `Runtime`
///
/// # Example
/// ```ignore
/// let runtime = RuntimeBuilder::new("my-service")
///     .with_task_handler(triggered_type("deployment"), DeployHandler, vec![])
///     .register::<Evaluation, _>(EvaluationHandler)
///     .expect_tasks(&["sh.keptn.event.deployment.triggered"])
///     .build()?;
/// ```
///
/// # Fail-fast
/// - `expect_tasks()` names the event types that must have a handler
/// - `build()` returns `BuildError::MissingTaskTypes` when one is missing
pub struct RuntimeBuilder {
    source: String,
    registry: TaskRegistry,
    config: RuntimeConfig,
    env: EnvConfig,
    expected_tasks: Option<Vec<String>>,
    id_generator: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<String>),

    #[error("source must not be empty")]
    EmptySource,

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

impl RuntimeBuilder {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            registry: TaskRegistry::new(),
            config: RuntimeConfig::default(),
            env: EnvConfig::default(),
            expected_tasks: None,
            id_generator: Arc::new(UuidGenerator),
            clock: Arc::new(SystemClock),
        }
    }

    /// Registers `handler` with automatic responses enabled.
    pub fn with_task_handler<H: TaskHandler + 'static>(
        self,
        event_type: impl Into<String>,
        handler: H,
        filters: Vec<EventFilter>,
    ) -> Self {
        self.with_task_event_handler(
            event_type,
            handler,
            TaskHandlerOptions::new().with_filters(filters),
        )
    }

    pub fn with_task_event_handler<H: TaskHandler + 'static>(
        mut self,
        event_type: impl Into<String>,
        handler: H,
        options: TaskHandlerOptions,
    ) -> Self {
        self.registry.register(event_type, Arc::new(handler), options);
        self
    }

    /// Registers a typed handler for `<T::TASK>.triggered`.
    pub fn register<T: TaskData, H: Handler<T> + 'static>(self, handler: H) -> Self {
        self.register_with::<T, H>(handler, TaskHandlerOptions::default())
    }

    pub fn register_with<T: TaskData, H: Handler<T> + 'static>(
        mut self,
        handler: H,
        options: TaskHandlerOptions,
    ) -> Self {
        self.registry.register_typed::<T, H>(handler, options);
        self
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.env = env;
        self
    }

    pub fn with_automatic_response(mut self, enabled: bool) -> Self {
        self.config.automatic_event_response = enabled;
        self
    }

    pub fn with_graceful_shutdown(mut self, enabled: bool) -> Self {
        self.config.graceful_shutdown = enabled;
        self
    }

    pub fn with_sync_processing(mut self, enabled: bool) -> Self {
        self.config.sync_processing = enabled;
        self
    }

    pub fn with_id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Event types that must have a handler when `build()` runs.
    pub fn expect_tasks(mut self, event_types: &[&str]) -> Self {
        self.expected_tasks = Some(event_types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Runtime, BuildError> {
        if self.source.trim().is_empty() {
            return Err(BuildError::EmptySource);
        }
        self.config.validate()?;
        if let Some(expected_tasks) = &self.expected_tasks {
            let missing_tasks: Vec<String> = expected_tasks
                .iter()
                .filter(|t| self.registry.lookup(t).is_none())
                .cloned()
                .collect();
            if !missing_tasks.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing_tasks));
            }
        }

        let factory = EventFactory::new(self.source.clone())
            .with_spec_version(self.config.spec_version.clone())
            .with_id_generator(self.id_generator)
            .with_clock(self.clock);
        let dispatcher = Dispatcher::new(
            self.registry,
            factory,
            self.config.automatic_event_response,
            self.config.sync_processing,
        );
        let shutdown =
            ShutdownCoordinator::new(self.config.graceful_shutdown, self.config.shutdown_grace_period);

        Ok(Runtime::new(self.source, dispatcher, shutdown, self.config, self.env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::TaskHandle;
    use crate::domain::{DecodedEvent, triggered_type};
    use crate::typed::TaskResult;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl TaskHandler for Noop {
        async fn execute(&self, _: &TaskHandle, _: &DecodedEvent) -> TaskResult {
            Ok(None)
        }
    }

    #[test]
    fn test_build_success() {
        let runtime = RuntimeBuilder::new("svc")
            .with_task_handler(triggered_type("test"), Noop, vec![])
            .expect_tasks(&["sh.keptn.event.test.triggered"])
            .build();
        assert!(runtime.is_ok());
    }

    #[test]
    fn test_build_missing_task_types() {
        let runtime = RuntimeBuilder::new("svc")
            .with_task_handler(triggered_type("test"), Noop, vec![])
            .expect_tasks(&[
                "sh.keptn.event.test.triggered",
                "sh.keptn.event.other.triggered",
            ])
            .build();
        assert!(matches!(
            runtime,
            Err(BuildError::MissingTaskTypes(missing)) if missing == vec!["sh.keptn.event.other.triggered".to_string()]
        ));
    }

    #[test]
    fn test_build_requires_source() {
        assert!(matches!(
            RuntimeBuilder::new("  ").build(),
            Err(BuildError::EmptySource)
        ));
    }

    #[test]
    fn options_reach_the_runtime() {
        let runtime = RuntimeBuilder::new("svc")
            .with_automatic_response(false)
            .with_graceful_shutdown(false)
            .with_sync_processing(true)
            .build()
            .unwrap();

        let config = runtime.config();
        assert!(!config.automatic_event_response);
        assert!(!config.graceful_shutdown);
        assert!(config.sync_processing);
        assert!(!runtime.wait_counter().is_tracking());
    }

    #[test]
    fn test_build_rejects_invalid_retry_policy() {
        let mut config = RuntimeConfig::default();
        config.retry.randomization_factor = f64::NAN;

        let runtime = RuntimeBuilder::new("svc").with_config(config).build();
        assert!(matches!(
            runtime,
            Err(BuildError::InvalidConfig(ConfigError::InvalidValue {
                key: "retry.randomization_factor",
                ..
            }))
        ));
    }
}
